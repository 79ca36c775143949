//! Harness configuration.
//!
//! Configuration is layered (built-in defaults, an optional JSON file, then CLI
//! flags) and resolved once into an immutable `HarnessConfig` that the
//! synthesizer, invoker, and oracle borrow.
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INSTALL_SCRIPT: &str = "install.sh";
pub const DEFAULT_WORD_LIST: &str = "/usr/share/dict/words";
pub const DEFAULT_BIN_DIR: &str = "/usr/bin";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const GOODIES_DIR_NAME: &str = "goodies";

/// One configuration layer; unset fields defer to earlier layers.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfigFile {
    pub base_dir: Option<PathBuf>,
    pub test_dir: Option<PathBuf>,
    pub goodies_dir: Option<PathBuf>,
    pub install_script: Option<String>,
    pub word_list: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub cases_per_type: Option<usize>,
    pub seed: Option<u64>,
    pub absolute_dest_root: Option<PathBuf>,
    pub types: Option<Vec<String>>,
    pub keep_passing: Option<bool>,
}

impl HarnessConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parse config {}", path.display()))
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: HarnessConfigFile) -> HarnessConfigFile {
        HarnessConfigFile {
            base_dir: other.base_dir.or(self.base_dir),
            test_dir: other.test_dir.or(self.test_dir),
            goodies_dir: other.goodies_dir.or(self.goodies_dir),
            install_script: other.install_script.or(self.install_script),
            word_list: other.word_list.or(self.word_list),
            bin_dir: other.bin_dir.or(self.bin_dir),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            cases_per_type: other.cases_per_type.or(self.cases_per_type),
            seed: other.seed.or(self.seed),
            absolute_dest_root: other.absolute_dest_root.or(self.absolute_dest_root),
            types: other.types.or(self.types),
            keep_passing: other.keep_passing.or(self.keep_passing),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Installer repository root; the installer runs from here.
    pub base_dir: PathBuf,
    /// Where target files are written.
    pub test_dir: PathBuf,
    pub goodies_dir: PathBuf,
    pub install_script: String,
    pub word_list: PathBuf,
    pub bin_dir: PathBuf,
    pub home_dir: PathBuf,
    pub timeout: Duration,
    pub cases_per_type: usize,
    pub seed: Option<u64>,
    pub absolute_dest_root: Option<PathBuf>,
    /// Requested type names; unknown names are kept so they hit the usage-error path.
    pub types: Vec<String>,
    pub keep_passing: bool,
}

impl HarnessConfig {
    /// Resolve a merged layer against the current directory and home directory.
    pub fn resolve(layer: HarnessConfigFile) -> Result<Self> {
        let cwd = std::env::current_dir().context("resolve current directory")?;
        let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("cannot resolve home directory"))?;
        Self::resolve_with(layer, &cwd, home_dir)
    }

    pub fn resolve_with(layer: HarnessConfigFile, cwd: &Path, home_dir: PathBuf) -> Result<Self> {
        let test_dir = canonical_or_joined(cwd, layer.test_dir.as_deref().unwrap_or(Path::new(".")))?;
        let base_dir = match layer.base_dir.as_deref() {
            Some(base_dir) => canonical_or_joined(cwd, base_dir)?,
            None => test_dir
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| anyhow!("test dir {} has no parent", test_dir.display()))?,
        };
        let goodies_dir = match layer.goodies_dir.as_deref() {
            Some(goodies_dir) => canonical_or_joined(cwd, goodies_dir)?,
            None => canonical_or_joined(&base_dir, Path::new(GOODIES_DIR_NAME))?,
        };

        let timeout_secs = layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be greater than zero"));
        }
        let cases_per_type = layer.cases_per_type.unwrap_or(1);
        if cases_per_type == 0 {
            return Err(anyhow!("cases_per_type must be at least 1"));
        }
        if let Some(root) = &layer.absolute_dest_root {
            if !root.is_absolute() {
                return Err(anyhow!(
                    "absolute_dest_root must be absolute, got {}",
                    root.display()
                ));
            }
        }

        let types = layer.types.unwrap_or_else(|| {
            crate::target::TargetType::ALL
                .iter()
                .map(|kind| kind.to_string())
                .collect()
        });

        Ok(Self {
            base_dir,
            test_dir,
            goodies_dir,
            install_script: layer
                .install_script
                .unwrap_or_else(|| DEFAULT_INSTALL_SCRIPT.to_string()),
            word_list: layer
                .word_list
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORD_LIST)),
            bin_dir: layer.bin_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_BIN_DIR)),
            home_dir,
            timeout: Duration::from_secs(timeout_secs),
            cases_per_type,
            seed: layer.seed,
            absolute_dest_root: layer.absolute_dest_root,
            types,
            keep_passing: layer.keep_passing.unwrap_or(false),
        })
    }
}

/// Join `path` onto `base` and canonicalize when it exists.
fn canonical_or_joined(base: &Path, path: &Path) -> Result<PathBuf> {
    let joined = base.join(path);
    if joined.exists() {
        joined
            .canonicalize()
            .with_context(|| format!("resolve {}", joined.display()))
    } else {
        Ok(joined)
    }
}
