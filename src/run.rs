//! Run controller: synthesize, invoke, and verify one or more cases per
//! target type, strictly in sequence.
//!
//! Fixtures of passing cases are removed; failing ones stay on disk for
//! inspection. Verification failures only mark the case; installer process
//! failures abort the run.
use crate::config::HarnessConfig;
use crate::invoke::Installer;
use crate::oracle::{render_failure_report, Failure, Oracle, Verdict};
use crate::synth::{SynthOptions, Synthesizer};
use crate::target::{TargetFile, TargetIdentity};
use crate::words::Vocabulary;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;

pub const SUCCESS_BANNER: &str = "All tests passed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseOutcome {
    Passed,
    Failed,
    /// Unknown target type; nothing was synthesized.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseRecord {
    pub target_type: String,
    pub case: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub outcome: CaseOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
    /// Whether the fixture is still on disk.
    pub kept: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub cases: Vec<CaseRecord>,
}

impl RunSummary {
    fn count(&self, outcome: CaseOutcome) -> usize {
        self.cases
            .iter()
            .filter(|record| record.outcome == outcome)
            .count()
    }

    pub fn passed(&self) -> usize {
        self.count(CaseOutcome::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(CaseOutcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(CaseOutcome::Skipped)
    }

    /// True when no case failed. Skipped usage errors do not count as failures.
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Everything one run needs, built once from the config.
pub struct RunContext<'a> {
    pub config: &'a HarnessConfig,
    pub vocabulary: &'a Vocabulary,
    pub installer: Installer,
    pub oracle: Oracle,
}

impl<'a> RunContext<'a> {
    pub fn new(config: &'a HarnessConfig, vocabulary: &'a Vocabulary) -> Self {
        Self {
            config,
            vocabulary,
            installer: Installer {
                base_dir: config.base_dir.clone(),
                script: config.install_script.clone(),
                timeout: config.timeout,
            },
            oracle: Oracle::new(&config.goodies_dir, &config.home_dir),
        }
    }

    pub fn run(&self) -> Result<RunSummary> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        tracing::info!(seed, "starting conformance run");
        let mut rng = StdRng::seed_from_u64(seed);
        let synthesizer = Synthesizer {
            vocabulary: self.vocabulary,
            options: SynthOptions {
                absolute_dest_root: self.config.absolute_dest_root.clone(),
            },
            dir: &self.config.test_dir,
        };

        let mut cases = Vec::new();
        for type_name in &self.config.types {
            for case in 0..self.config.cases_per_type {
                let Some(identity) = synthesizer.synthesize(type_name, &mut rng)? else {
                    cases.push(CaseRecord {
                        target_type: type_name.clone(),
                        case,
                        name: None,
                        path: None,
                        outcome: CaseOutcome::Skipped,
                        failure: None,
                        kept: false,
                    });
                    break;
                };
                cases.push(self.check_case(&identity, case)?);
            }
        }

        Ok(RunSummary { seed, cases })
    }

    /// Invoke and verify one synthesized target.
    fn check_case(&self, identity: &TargetIdentity, case: usize) -> Result<CaseRecord> {
        tracing::info!(target_type = %identity.kind, name = %identity.name, case, "checking target");
        let absolute = identity
            .path
            .canonicalize()
            .with_context(|| format!("resolve target {}", identity.path.display()))?;
        let output = self
            .installer
            .invoke(&absolute)
            .with_context(|| format!("{} target {}", identity.kind, identity.name))?;

        let target = TargetFile::load(&identity.path)?;
        let verdict = self.oracle.verify(identity.kind, &target, &output);

        let (outcome, failure, kept) = match verdict {
            Verdict::Pass => {
                let kept = self.config.keep_passing;
                if !kept {
                    std::fs::remove_file(&identity.path)
                        .with_context(|| format!("remove {}", identity.path.display()))?;
                }
                tracing::info!(name = %identity.name, "target passed");
                (CaseOutcome::Passed, None, kept)
            }
            Verdict::Fail(failure) => {
                eprint!(
                    "{}",
                    render_failure_report(identity.kind, &identity.name, &failure, Some(&output))
                );
                tracing::warn!(
                    name = %identity.name,
                    kind = %failure.kind,
                    path = %identity.path.display(),
                    "target failed; fixture kept"
                );
                (CaseOutcome::Failed, Some(failure), true)
            }
        };

        Ok(CaseRecord {
            target_type: identity.kind.to_string(),
            case,
            name: Some(identity.name.clone()),
            path: Some(identity.path.clone()),
            outcome,
            failure,
            kept,
        })
    }
}
