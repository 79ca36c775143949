//! Target file model: the closed set of target types, the `#TARGET` header
//! grammar, and classification of body records.
//!
//! Parsing is lenient about the header so a hand-edited fixture can still be
//! verified; the oracle decides what a malformed body means for a verdict.
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Extension every synthesized target file carries.
pub const TEST_TARGET_EXT: &str = ".testtarget";
/// Suffix appended to every synthesized place-files destination.
pub const PLACE_FILES_SUFFIX: &str = ".testdest";
/// Prefix of header lines (`#TARGET <key> <value>`).
pub const HEADER_PREFIX: &str = "#TARGET";
/// Prefix of the interpreter line that opens a script target.
pub const SHEBANG_PREFIX: &str = "#!";
/// Separator between source and destination in a place-files directive.
pub const PLACE_FILES_ARROW: &str = ">";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetType {
    PkgInstall,
    Script,
    PlaceFiles,
}

impl TargetType {
    /// Every supported type, in the order a run exercises them.
    pub const ALL: [TargetType; 3] = [
        TargetType::PkgInstall,
        TargetType::Script,
        TargetType::PlaceFiles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetType::PkgInstall => "pkg-install",
            TargetType::Script => "script",
            TargetType::PlaceFiles => "place-files",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested a target type outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTargetType(pub String);

impl fmt::Display for UnknownTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot test unknown target type {}", self.0)
    }
}

impl std::error::Error for UnknownTargetType {}

impl FromStr for TargetType {
    type Err = UnknownTargetType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownTargetType(s.to_string()))
    }
}

/// Identity of a target file written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetIdentity {
    pub name: String,
    pub path: PathBuf,
    pub kind: TargetType,
}

/// File name for a target called `name`.
pub fn target_file_name(name: &str) -> String {
    format!("{name}{TEST_TARGET_EXT}")
}

/// Target name recovered from a file path (file name minus the extension).
pub fn target_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    match file_name.strip_suffix(TEST_TARGET_EXT) {
        Some(stem) => stem.to_string(),
        None => file_name,
    }
}

/// A record of a target body as the installer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLine<'a> {
    /// Comment (including header and shebang) or blank line.
    Ignored,
    /// A semantic directive, whitespace-trimmed.
    Directive(&'a str),
}

/// Classify one raw line. Comments are recognised only in column zero.
pub fn classify_body_line(line: &str) -> BodyLine<'_> {
    if line.starts_with('#') {
        return BodyLine::Ignored;
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        BodyLine::Ignored
    } else {
        BodyLine::Directive(trimmed)
    }
}

/// Parsed contents of a target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    pub path: PathBuf,
    /// Interpreter named by the opening `#!` line, if present.
    pub shebang: Option<String>,
    /// `#TARGET` header entries in file order.
    pub headers: Vec<(String, String)>,
    text: String,
}

impl TargetFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read target {}", path.display()))?;
        Ok(Self::parse(path, text))
    }

    pub fn parse(path: &Path, text: String) -> Self {
        let shebang = text
            .lines()
            .next()
            .map(str::trim)
            .and_then(|line| line.strip_prefix(SHEBANG_PREFIX))
            .map(|interpreter| interpreter.to_string());

        let headers = text
            .lines()
            .filter_map(|line| {
                let rest = line.strip_prefix(HEADER_PREFIX)?;
                let mut parts = rest.trim().splitn(2, char::is_whitespace);
                let key = parts.next().filter(|key| !key.is_empty())?;
                let value = parts.next().unwrap_or("").trim();
                Some((key.to_string(), value.to_string()))
            })
            .collect();

        Self {
            path: path.to_path_buf(),
            shebang,
            headers,
            text,
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// Name from the header, falling back to the file name.
    pub fn name(&self) -> String {
        self.header("name")
            .map(str::to_string)
            .unwrap_or_else(|| target_name_from_path(&self.path))
    }

    pub fn declared_type(&self) -> Result<TargetType> {
        let raw = self
            .header("type")
            .with_context(|| format!("{} has no #TARGET type header", self.path.display()))?;
        Ok(raw.parse()?)
    }

    /// Semantic directives of the body, in file order.
    pub fn directives(&self) -> impl Iterator<Item = &str> + '_ {
        self.text.lines().filter_map(|line| match classify_body_line(line) {
            BodyLine::Directive(directive) => Some(directive),
            BodyLine::Ignored => None,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
