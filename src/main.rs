use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod invoke;
mod oracle;
mod run;
mod simulation;
mod synth;
mod target;
mod util;
mod words;

use cli::{Command, GenerateArgs, RootArgs, RunArgs, VerifyArgs};
use config::{HarnessConfig, HarnessConfigFile};
use invoke::InvokeError;
use oracle::{render_failure_report, Oracle, Verdict};
use run::{RunContext, SUCCESS_BANNER};
use synth::{SynthOptions, Synthesizer};
use target::{TargetFile, TargetType};
use words::Vocabulary;

/// Exit status for a fatal harness or installer error.
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_logging(&args.log_level);

    let result = match args.command {
        Command::Run(args) => cmd_run(args),
        Command::Generate(args) => cmd_generate(args),
        Command::Verify(args) => cmd_verify(args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            let stdout = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<InvokeError>())
                .and_then(InvokeError::stdout);
            if let Some(stdout) = stdout {
                eprintln!("{}", util::raw_output_block(stdout));
            }
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Defaults, then the config file named by `--config`, then flags.
fn resolve_config(
    config_path: Option<&std::path::Path>,
    flags: HarnessConfigFile,
) -> Result<HarnessConfig> {
    let file = match config_path {
        Some(path) => HarnessConfigFile::load(path)?,
        None => HarnessConfigFile::default(),
    };
    HarnessConfig::resolve(file.merge(flags))
}

fn load_vocabulary(config: &HarnessConfig) -> Result<Vocabulary> {
    Vocabulary::load(&config.word_list, &config.bin_dir, &config.goodies_dir)
}

fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let config = resolve_config(args.locations.config.as_deref(), args.layer())?;
    let vocabulary = load_vocabulary(&config)?;
    let summary = RunContext::new(&config, &vocabulary).run()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    if summary.skipped() > 0 {
        eprintln!("Skipped {} unknown target type(s).", summary.skipped());
    }
    if !summary.all_passed() {
        eprintln!(
            "{} of {} case(s) failed (seed {}).",
            summary.failed(),
            summary.passed() + summary.failed(),
            summary.seed
        );
        return Ok(ExitCode::FAILURE);
    }
    if !args.json {
        println!("{SUCCESS_BANNER}");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_generate(args: GenerateArgs) -> Result<ExitCode> {
    let config = resolve_config(args.locations.config.as_deref(), args.layer())?;
    let vocabulary = load_vocabulary(&config)?;
    let synthesizer = Synthesizer {
        vocabulary: &vocabulary,
        options: SynthOptions {
            absolute_dest_root: config.absolute_dest_root.clone(),
        },
        dir: &config.test_dir,
    };
    let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));

    match synthesizer.synthesize(&args.target_type, &mut rng)? {
        Some(identity) => {
            println!("{}", identity.path.display());
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

fn cmd_verify(args: VerifyArgs) -> Result<ExitCode> {
    let config = resolve_config(args.locations.config.as_deref(), args.layer())?;
    let target = TargetFile::load(&args.target)?;
    let kind = match args.target_type.as_deref() {
        Some(name) => name.parse::<TargetType>()?,
        None => target.declared_type()?,
    };
    let output = std::fs::read_to_string(&args.output)
        .with_context(|| format!("read output {}", args.output.display()))?;

    let oracle = Oracle::new(&config.goodies_dir, &config.home_dir);
    if args.explain {
        // A malformed target is reported by the verdict below.
        if let Ok(commands) = oracle.expected_commands(kind, &target) {
            for command in commands {
                println!("expect: {command}");
            }
        }
    }
    match oracle.verify(kind, &target, &output) {
        Verdict::Pass => {
            println!("PASS: {kind} target {}", target.name());
            Ok(ExitCode::SUCCESS)
        }
        Verdict::Fail(failure) => {
            eprint!(
                "{}",
                render_failure_report(kind, &target.name(), &failure, Some(&output))
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
