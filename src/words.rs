//! Word source: the vocabulary target names, packages, interpreters, and
//! goodies are drawn from.
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Replacement for any character that is not shell-safe in a token.
pub const FILLER_CHAR: &str = "-";
const NON_ALNUM_PATTERN: &str = "[^a-zA-Z0-9]";

/// Immutable pools of tokens, loaded once per run.
///
/// Listings are sorted so a fixed seed reproduces the same fixtures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub words: Vec<String>,
    pub binaries: Vec<PathBuf>,
    pub goodies: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from raw words; words are sanitized and empty ones dropped.
    pub fn new<I, S>(
        raw_words: I,
        mut binaries: Vec<PathBuf>,
        mut goodies: Vec<String>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sanitizer = TokenSanitizer::new()?;
        let words = raw_words
            .into_iter()
            .filter(|word| !word.as_ref().trim().is_empty())
            .map(|word| sanitizer.sanitize(word.as_ref().trim()))
            .collect();
        binaries.sort();
        goodies.sort();
        Ok(Self {
            words,
            binaries,
            goodies,
        })
    }

    /// Load every pool from the filesystem locations in the config.
    pub fn load(word_list: &Path, bin_dir: &Path, goodies_dir: &Path) -> Result<Self> {
        let bytes = fs::read(word_list)
            .with_context(|| format!("read word list {}", word_list.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        let binaries = list_executables(bin_dir)?;
        let goodies = list_goodies(goodies_dir)?;
        let vocabulary = Self::new(text.lines(), binaries, goodies)?;
        if vocabulary.words.is_empty() {
            return Err(anyhow!("word list {} has no words", word_list.display()));
        }
        tracing::debug!(
            words = vocabulary.words.len(),
            binaries = vocabulary.binaries.len(),
            goodies = vocabulary.goodies.len(),
            "vocabulary loaded"
        );
        Ok(vocabulary)
    }
}

/// Replaces every non-alphanumeric character with [`FILLER_CHAR`].
#[derive(Debug, Clone)]
pub struct TokenSanitizer {
    pattern: Regex,
}

impl TokenSanitizer {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(NON_ALNUM_PATTERN).context("compile token sanitizer")?;
        Ok(Self { pattern })
    }

    pub fn sanitize(&self, token: &str) -> String {
        self.pattern.replace_all(token, FILLER_CHAR).into_owned()
    }
}

/// Executable regular files directly under `dir`, as absolute paths.
pub fn list_executables(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "binary directory missing; script targets unavailable");
        return Ok(Vec::new());
    }
    let mut binaries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
            binaries.push(path);
        }
    }
    binaries.sort();
    Ok(binaries)
}

/// Entry names of the goodies directory.
pub fn list_goodies(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "goodies directory missing; place-files targets unavailable");
        return Ok(Vec::new());
    }
    let mut goodies = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        goodies.push(entry.file_name().to_string_lossy().to_string());
    }
    goodies.sort();
    Ok(goodies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_and_drops_empty_words() {
        let vocabulary = Vocabulary::new(
            ["O'Brien", "", "  ", "caf\u{e9}", "plain"],
            Vec::new(),
            Vec::new(),
        )
        .expect("build vocabulary");
        assert_eq!(vocabulary.words, vec!["O-Brien", "caf-", "plain"]);
    }

    #[test]
    fn lists_only_executable_files() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let exe = dir.path().join("runme");
        let plain = dir.path().join("readme");
        fs::write(&exe, "#!/bin/sh\n").expect("write exe");
        fs::write(&plain, "text").expect("write plain");
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).expect("chmod exe");
        fs::set_permissions(&plain, fs::Permissions::from_mode(0o644)).expect("chmod plain");
        fs::create_dir(dir.path().join("subdir")).expect("create subdir");

        assert_eq!(list_executables(dir.path()).expect("list"), vec![exe]);
    }

    #[test]
    fn missing_directories_yield_empty_pools() {
        let missing = Path::new("/nonexistent/tconf/goodies");
        assert!(list_goodies(missing).expect("list goodies").is_empty());
        assert!(list_executables(missing).expect("list binaries").is_empty());
    }

    #[test]
    fn load_reads_word_list_and_sorts_goodies() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let words = dir.path().join("words");
        fs::write(&words, "alpha\nbeta's\n").expect("write words");
        let goodies = dir.path().join("goodies");
        fs::create_dir(&goodies).expect("create goodies");
        fs::write(goodies.join("zsh"), "").expect("write goodie");
        fs::write(goodies.join("bashrc"), "").expect("write goodie");

        let vocabulary =
            Vocabulary::load(&words, &dir.path().join("bin"), &goodies).expect("load vocabulary");
        assert_eq!(vocabulary.words, vec!["alpha", "beta-s"]);
        assert_eq!(vocabulary.goodies, vec!["bashrc", "zsh"]);
        assert!(vocabulary.binaries.is_empty());
    }
}
