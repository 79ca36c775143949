//! Output oracle.
//!
//! Derives, from a target file alone, the commands the installer must report
//! in simulation mode, then checks them one-for-one against captured output.
//! The first mismatch or the end of the stream decides a failing verdict.
use crate::simulation::{OutputCursor, OutputLine, SIMULATION_TAG};
use crate::target::{TargetFile, TargetType, PLACE_FILES_ARROW};
use crate::util::raw_output_block;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Package-index refresh emitted before any pkg-install action.
pub const PKG_UPDATE_CMD: &str = "sudo apt-get update >/dev/null";
pub const PKG_INSTALL_CMD_PREFIX: &str = "sudo apt-get install -y >/dev/null";
/// Environment the installer passes to every target script.
pub const SCRIPT_ENV: &str = "GOODIES_DIR=goodies/";
pub const NOT_ENOUGH_OUTPUT: &str = "[Not enough output]";
/// Expected value reported when an action follows the last derived command.
pub const NO_FURTHER_ACTIONS: &str = "[No further actions]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An action line differs from the derived command.
    Mismatch,
    /// The stream ended before every expected action was seen.
    Exhausted,
    /// An untagged line appeared where an action was expected.
    Untagged,
    /// The target body cannot be interpreted for its type.
    Malformed,
    /// A tagged action followed the last derived command.
    Surplus,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Mismatch => "mismatch",
            FailureKind::Exhausted => "not enough output",
            FailureKind::Untagged => "untagged output",
            FailureKind::Malformed => "malformed target",
            FailureKind::Surplus => "unexpected extra action",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub expected: String,
    pub found: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(Failure),
}

/// Which part of a tagged line an expectation is compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compare {
    /// The whole trimmed line, tag included.
    Line,
    /// The command text after the tag separator.
    Command,
    /// The command text, whitespace-trimmed.
    CommandTrimmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Expectation {
    text: String,
    compare: Compare,
}

/// Resolution context for expected commands.
#[derive(Debug, Clone)]
pub struct Oracle {
    pub goodies_dir: PathBuf,
    pub home_dir: PathBuf,
}

impl Oracle {
    pub fn new(goodies_dir: &Path, home_dir: &Path) -> Self {
        Self {
            goodies_dir: goodies_dir.to_path_buf(),
            home_dir: home_dir.to_path_buf(),
        }
    }

    /// Expected command text per action, in the order the installer must emit them.
    pub fn expected_commands(
        &self,
        kind: TargetType,
        target: &TargetFile,
    ) -> Result<Vec<String>, Failure> {
        Ok(self
            .expectations(kind, target)?
            .into_iter()
            .map(|expectation| expectation.text)
            .collect())
    }

    pub fn verify(&self, kind: TargetType, target: &TargetFile, output: &str) -> Verdict {
        let expectations = match self.expectations(kind, target) {
            Ok(expectations) => expectations,
            Err(failure) => return Verdict::Fail(failure),
        };

        let mut cursor = OutputCursor::new(output);
        let mut pending = match cursor.seek_first_action() {
            Ok(action) => Some(OutputLine::Action(action)),
            Err(exhausted_at) => {
                tracing::debug!(consumed = exhausted_at.consumed, "no simulated action in output");
                let expected = expectations
                    .first()
                    .map(|expectation| expectation.text.clone())
                    .unwrap_or_else(|| format!("{SIMULATION_TAG}: ..."));
                return Verdict::Fail(exhausted(expected));
            }
        };

        for expectation in expectations {
            let line = match pending.take() {
                Some(line) => line,
                None => match cursor.next_line() {
                    Ok(line) => line,
                    Err(exhausted_at) => {
                        tracing::debug!(consumed = exhausted_at.consumed, "output ended early");
                        return Verdict::Fail(exhausted(expectation.text));
                    }
                },
            };
            let found = match (&line, expectation.compare) {
                (OutputLine::Preamble(raw), _) => {
                    return Verdict::Fail(Failure {
                        kind: FailureKind::Untagged,
                        expected: expectation.text,
                        found: raw.to_string(),
                    });
                }
                (OutputLine::Action(action), Compare::Line) => action.line.to_string(),
                (OutputLine::Action(action), Compare::Command) => action.command.clone(),
                (OutputLine::Action(action), Compare::CommandTrimmed) => {
                    action.command.trim().to_string()
                }
            };
            if found != expectation.text {
                return Verdict::Fail(Failure {
                    kind: FailureKind::Mismatch,
                    expected: expectation.text,
                    found,
                });
            }
        }

        // Untagged trailer lines are allowed; further actions are not.
        while let Ok(line) = cursor.next_line() {
            if let OutputLine::Action(action) = line {
                return Verdict::Fail(Failure {
                    kind: FailureKind::Surplus,
                    expected: NO_FURTHER_ACTIONS.to_string(),
                    found: action.line.to_string(),
                });
            }
        }
        Verdict::Pass
    }

    fn expectations(
        &self,
        kind: TargetType,
        target: &TargetFile,
    ) -> Result<Vec<Expectation>, Failure> {
        match kind {
            TargetType::PkgInstall => {
                let mut expectations = vec![Expectation {
                    text: format!("{SIMULATION_TAG}: {PKG_UPDATE_CMD}"),
                    compare: Compare::Line,
                }];
                expectations.extend(target.directives().map(|line| Expectation {
                    text: format!("{PKG_INSTALL_CMD_PREFIX} {line}"),
                    compare: Compare::Command,
                }));
                Ok(expectations)
            }
            TargetType::Script => {
                let interpreter = target.shebang.as_deref().ok_or_else(|| Failure {
                    kind: FailureKind::Malformed,
                    expected: "#!<interpreter>".to_string(),
                    found: target.text().lines().next().unwrap_or("").to_string(),
                })?;
                let script = resolve_existing(&target.path);
                Ok(vec![Expectation {
                    text: format!(
                        "{SIMULATION_TAG}: {SCRIPT_ENV} {interpreter} {} >/dev/null",
                        script.display()
                    ),
                    compare: Compare::Line,
                }])
            }
            TargetType::PlaceFiles => target
                .directives()
                .map(|line| {
                    let (source, dest) = parse_place_files_line(line).ok_or_else(|| Failure {
                        kind: FailureKind::Malformed,
                        expected: format!("<source> {PLACE_FILES_ARROW} <destination>"),
                        found: line.to_string(),
                    })?;
                    Ok(Expectation {
                        text: self.copy_command(source, dest),
                        compare: Compare::CommandTrimmed,
                    })
                })
                .collect(),
        }
    }

    /// `cp -a` with the source under the goodies directory and the
    /// destination under the home directory. Absolute destinations stay as-is.
    pub fn copy_command(&self, source: &str, dest: &str) -> String {
        let source = resolve_existing(&self.goodies_dir.join(source));
        let dest = self.home_dir.join(dest);
        format!("cp -a {} {}", source.display(), dest.display())
    }
}

fn parse_place_files_line(line: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [source, arrow, dest] if *arrow == PLACE_FILES_ARROW => Some((*source, *dest)),
        _ => None,
    }
}

/// Canonical form of `path` when it exists, otherwise `path` unchanged.
fn resolve_existing(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn exhausted(expected: String) -> Failure {
    Failure {
        kind: FailureKind::Exhausted,
        expected,
        found: NOT_ENOUGH_OUTPUT.to_string(),
    }
}

/// Human-readable failure report, including the raw installer output.
pub fn render_failure_report(
    kind: TargetType,
    name: &str,
    failure: &Failure,
    output: Option<&str>,
) -> String {
    let mut report = format!("FAIL: {kind} target {name} ({})\n", failure.kind);
    report.push_str(&format!("Expected: {}\n", failure.expected));
    report.push_str(&format!("Found: {}\n", failure.found));
    if let Some(output) = output {
        report.push('\n');
        report.push_str(&raw_output_block(output));
        report.push('\n');
    }
    report
}
