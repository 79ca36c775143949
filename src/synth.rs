//! Target synthesizer.
//!
//! `generate` is a pure function of type, vocabulary, and RNG state; writing
//! the result to disk is a separate step so generation can be tested under a
//! fixed seed.
use crate::target::{
    target_file_name, TargetIdentity, TargetType, UnknownTargetType, HEADER_PREFIX,
    PLACE_FILES_ARROW, PLACE_FILES_SUFFIX, SHEBANG_PREFIX,
};
use crate::words::Vocabulary;
use anyhow::{anyhow, Context, Result};
use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::{Path, PathBuf};

pub const PKG_INSTALL_MAX_LINES: usize = 5;
pub const PKG_INSTALL_MAX_PKGS_PER_LINE: usize = 5;
pub const PLACE_FILES_MAX_LINES: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct SynthOptions {
    /// When set, place-files destinations are sometimes absolute paths under this root.
    pub absolute_dest_root: Option<PathBuf>,
}

/// A generated target, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetContent {
    pub name: String,
    pub kind: TargetType,
    pub text: String,
}

pub fn generate<R: Rng + ?Sized>(
    kind: TargetType,
    vocabulary: &Vocabulary,
    options: &SynthOptions,
    rng: &mut R,
) -> Result<TargetContent> {
    let name = pick_word(vocabulary, rng)?.to_string();
    let mut text = String::new();

    if kind == TargetType::Script {
        let interpreter = vocabulary
            .binaries
            .choose(rng)
            .ok_or_else(|| anyhow!("no executables available for a script shebang"))?;
        text.push_str(&format!("{SHEBANG_PREFIX}{}\n", interpreter.display()));
    }

    text.push_str(&format!("{HEADER_PREFIX} name {name}\n"));
    text.push_str(&format!("{HEADER_PREFIX} type {kind}\n"));
    text.push('\n');

    match kind {
        TargetType::PkgInstall => {
            for _ in 0..rng.random_range(1..=PKG_INSTALL_MAX_LINES) {
                let count = rng.random_range(1..=PKG_INSTALL_MAX_PKGS_PER_LINE);
                let mut packages = Vec::with_capacity(count);
                for _ in 0..count {
                    packages.push(pick_word(vocabulary, rng)?);
                }
                text.push_str(&packages.join(" "));
                text.push('\n');
            }
        }
        TargetType::Script => {}
        TargetType::PlaceFiles => {
            for _ in 0..rng.random_range(1..=PLACE_FILES_MAX_LINES) {
                let goodie = vocabulary
                    .goodies
                    .choose(rng)
                    .ok_or_else(|| anyhow!("goodies directory is empty"))?;
                let dest = format!("{}{PLACE_FILES_SUFFIX}", pick_word(vocabulary, rng)?);
                let dest = match &options.absolute_dest_root {
                    Some(root) if rng.random_bool(0.5) => root.join(dest).display().to_string(),
                    _ => dest,
                };
                text.push_str(&format!("{goodie} {PLACE_FILES_ARROW} {dest}\n"));
            }
        }
    }

    Ok(TargetContent { name, kind, text })
}

fn pick_word<'a, R: Rng + ?Sized>(vocabulary: &'a Vocabulary, rng: &mut R) -> Result<&'a str> {
    vocabulary
        .words
        .choose(rng)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("word list is empty"))
}

/// Write `content` to `<dir>/<name>.testtarget`, replacing any previous file.
pub fn write_target(dir: &Path, content: &TargetContent) -> Result<TargetIdentity> {
    let path = dir.join(target_file_name(&content.name));
    std::fs::write(&path, &content.text)
        .with_context(|| format!("write target {}", path.display()))?;
    Ok(TargetIdentity {
        name: content.name.clone(),
        path,
        kind: content.kind,
    })
}

/// Synthesizes target files into one working directory.
pub struct Synthesizer<'a> {
    pub vocabulary: &'a Vocabulary,
    pub options: SynthOptions,
    pub dir: &'a Path,
}

impl Synthesizer<'_> {
    /// Returns `Ok(None)` for an unknown type name; that is a usage error, not a failure.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        type_name: &str,
        rng: &mut R,
    ) -> Result<Option<TargetIdentity>> {
        let kind = match type_name.parse::<TargetType>() {
            Ok(kind) => kind,
            Err(UnknownTargetType(name)) => {
                tracing::debug!(target_type = %name, "skipping unknown target type");
                eprintln!("Cannot test unknown target type {name}.");
                return Ok(None);
            }
        };
        let content = generate(kind, self.vocabulary, &self.options, rng)?;
        let identity = write_target(self.dir, &content)?;
        tracing::debug!(name = %identity.name, path = %identity.path.display(), "target written");
        Ok(Some(identity))
    }
}
