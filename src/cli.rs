//! CLI argument parsing for the conformance harness.
//!
//! Flags only populate a configuration layer; resolution and validation live
//! in `config` so the same rules apply to config files.
use crate::config::HarnessConfigFile;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tconf",
    version,
    about = "Randomized conformance checks for the installer's simulation mode",
    after_help = "Commands:\n  run                                   Synthesize, simulate, and verify each target type\n  generate --type <TYPE>                Write one randomized target file\n  verify --target <FILE> --output <FILE> Check saved simulation output against a target\n\nExamples:\n  tconf run\n  tconf run --count 10 --seed 1234 --type place-files\n  tconf generate --type script\n  tconf verify --target orca.testtarget --output orca.out",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, value_name = "FILTER", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Generate(GenerateArgs),
    Verify(VerifyArgs),
}

/// Locations shared by every command.
#[derive(Args, Debug)]
pub struct LocationArgs {
    /// JSON config file; flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Installer repository root (default: parent of the test dir)
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Directory target files are written to (default: current dir)
    #[arg(long, value_name = "DIR")]
    pub test_dir: Option<PathBuf>,

    /// Goodies directory (default: <base-dir>/goodies)
    #[arg(long, value_name = "DIR")]
    pub goodies_dir: Option<PathBuf>,

    /// Word list used for names and packages
    #[arg(long, value_name = "PATH")]
    pub word_list: Option<PathBuf>,

    /// Directory of executables used as script interpreters
    #[arg(long, value_name = "DIR")]
    pub bin_dir: Option<PathBuf>,
}

impl LocationArgs {
    fn layer(&self) -> HarnessConfigFile {
        HarnessConfigFile {
            base_dir: self.base_dir.clone(),
            test_dir: self.test_dir.clone(),
            goodies_dir: self.goodies_dir.clone(),
            word_list: self.word_list.clone(),
            bin_dir: self.bin_dir.clone(),
            ..Default::default()
        }
    }
}

/// Run one or more randomized cases per target type.
#[derive(Args, Debug)]
#[command(about = "Synthesize, simulate, and verify each target type")]
pub struct RunArgs {
    #[command(flatten)]
    pub locations: LocationArgs,

    /// Installer script, relative to the base dir
    #[arg(long, value_name = "PATH")]
    pub install_script: Option<String>,

    /// Seconds before a silent installer counts as hung
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Cases per target type
    #[arg(long, short = 'n', value_name = "N")]
    pub count: Option<usize>,

    /// RNG seed, for replaying a run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Target type to test (repeatable; default: all)
    #[arg(long = "type", value_name = "TYPE")]
    pub types: Vec<String>,

    /// Root for absolute place-files destinations
    #[arg(long, value_name = "DIR")]
    pub absolute_dest_root: Option<PathBuf>,

    /// Keep fixtures of passing cases
    #[arg(long)]
    pub keep_passing: bool,

    /// Emit a machine-readable summary on stdout
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn layer(&self) -> HarnessConfigFile {
        HarnessConfigFile {
            install_script: self.install_script.clone(),
            timeout_secs: self.timeout_secs,
            cases_per_type: self.count,
            seed: self.seed,
            types: (!self.types.is_empty()).then(|| self.types.clone()),
            absolute_dest_root: self.absolute_dest_root.clone(),
            keep_passing: self.keep_passing.then_some(true),
            ..self.locations.layer()
        }
    }
}

/// Write a single randomized target without invoking the installer.
#[derive(Args, Debug)]
#[command(about = "Write one randomized target file")]
pub struct GenerateArgs {
    #[command(flatten)]
    pub locations: LocationArgs,

    /// Target type to synthesize
    #[arg(long = "type", value_name = "TYPE")]
    pub target_type: String,

    /// RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Root for absolute place-files destinations
    #[arg(long, value_name = "DIR")]
    pub absolute_dest_root: Option<PathBuf>,
}

impl GenerateArgs {
    pub fn layer(&self) -> HarnessConfigFile {
        HarnessConfigFile {
            seed: self.seed,
            absolute_dest_root: self.absolute_dest_root.clone(),
            ..self.locations.layer()
        }
    }
}

/// Check captured simulation output against an existing target file.
#[derive(Args, Debug)]
#[command(about = "Verify saved simulation output against a target file")]
pub struct VerifyArgs {
    #[command(flatten)]
    pub locations: LocationArgs,

    /// Target file to derive expectations from
    #[arg(long, value_name = "FILE")]
    pub target: PathBuf,

    /// File holding the installer's captured stdout
    #[arg(long, value_name = "FILE")]
    pub output: PathBuf,

    /// Override the type declared in the target header
    #[arg(long = "type", value_name = "TYPE")]
    pub target_type: Option<String>,

    /// Print the derived commands before verifying
    #[arg(long)]
    pub explain: bool,
}

impl VerifyArgs {
    pub fn layer(&self) -> HarnessConfigFile {
        self.locations.layer()
    }
}
