//! The exploration campaign loop.

use crate::counterexample::Counterexample;
use envrig_core::{
    ChoiceRecord, ChoiceSeq, ChoiceSource, EnvScheduler, PathError, PathResult, PathStatus,
};
use envrig_model::{ConfigurationError, ModelDesc};
use envrig_trace::verify;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from the exploration engine.
#[derive(Error, Debug)]
pub enum ExploreError {
    #[error("model configuration: {0}")]
    Config(#[from] ConfigurationError),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// How the campaign walks the choice tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchMode {
    /// Depth-first enumeration of every ordinal at every branch point.
    #[default]
    Exhaustive,
    /// Seeded uniform sampling; deterministic given the seed.
    RandomWalk { runs: u64, seed: u64 },
}

/// Configuration for an exploration campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Max paths to run before stopping, exhausted or not.
    pub max_paths: u64,
    /// Per-path choice budget; paths that run past it are truncated.
    /// This is the external bound that guarantees termination of models
    /// with unbounded callback loops.
    pub max_choices_per_path: u64,
    pub mode: SearchMode,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_paths: 10_000,
            max_choices_per_path: 128,
            mode: SearchMode::default(),
        }
    }
}

/// Outcome of one exploration campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationReport {
    pub paths_run: u64,
    pub clean: u64,
    pub violations: u64,
    /// Paths ended by the per-path choice budget.
    pub truncated: u64,
    /// Distinct choice sequences seen (== `paths_run` for exhaustive
    /// search; possibly fewer for a random walk).
    pub distinct_paths: u64,
    /// Whether the whole tree (or the full run count) was covered before
    /// `max_paths` hit.
    pub exhausted: bool,
    pub counterexamples: Vec<Counterexample>,
}

/// The exploration engine: runs one model through the scheduler path by
/// path and collects verdicts.
pub struct Explorer {
    scheduler: EnvScheduler,
    config: ExplorerConfig,
}

impl Explorer {
    /// Validate the model and build an explorer for it.
    pub fn new(model: ModelDesc, config: ExplorerConfig) -> Result<Self, ExploreError> {
        Ok(Self {
            scheduler: EnvScheduler::new(model)?,
            config,
        })
    }

    /// Attach a collaborator-supplied callback body (see
    /// [`EnvScheduler::set_handler`]).
    pub fn set_handler(
        &mut self,
        component: &str,
        callback: &str,
        handler: envrig_core::CallbackHandler,
    ) -> Result<(), ConfigurationError> {
        self.scheduler.set_handler(component, callback, handler)
    }

    /// Run the full campaign.
    pub fn run(&mut self) -> Result<ExplorationReport, ExploreError> {
        info!(
            "exploring model {:?}: mode={:?}, max_paths={}, budget={}",
            self.scheduler.model().name,
            self.config.mode,
            self.config.max_paths,
            self.config.max_choices_per_path
        );

        let report = match self.config.mode {
            SearchMode::Exhaustive => self.run_exhaustive()?,
            SearchMode::RandomWalk { runs, seed } => self.run_walk(runs, seed)?,
        };

        info!(
            "exploration done: {} paths ({} clean, {} violations, {} truncated), exhausted={}",
            report.paths_run,
            report.clean,
            report.violations,
            report.truncated,
            report.exhausted
        );
        Ok(report)
    }

    /// Re-run one recorded path deterministically.
    pub fn replay(&self, choices: &ChoiceSeq) -> Result<PathResult, ExploreError> {
        let source = ChoiceSource::scripted(choices.ordinals(), self.config.max_choices_per_path);
        Ok(self.scheduler.run_path(source)?)
    }

    fn run_exhaustive(&mut self) -> Result<ExplorationReport, ExploreError> {
        let mut tally = Tally::default();
        let mut prefix: Vec<u64> = Vec::new();

        loop {
            let source =
                ChoiceSource::scripted(prefix.clone(), self.config.max_choices_per_path);
            let result = self.scheduler.run_path(source)?;
            let next = next_prefix(result.choices.records());
            tally.record(result);

            match next {
                None => {
                    tally.exhausted = true;
                    break;
                }
                Some(p) => {
                    if tally.paths_run >= self.config.max_paths {
                        warn!(
                            "stopping after {} paths with branches left untried",
                            tally.paths_run
                        );
                        break;
                    }
                    prefix = p;
                }
            }
        }

        Ok(tally.into_report())
    }

    fn run_walk(&mut self, runs: u64, seed: u64) -> Result<ExplorationReport, ExploreError> {
        let mut tally = Tally::default();

        for run in 0..runs {
            if tally.paths_run >= self.config.max_paths {
                warn!("stopping after {} paths, {} runs left", tally.paths_run, runs - run);
                break;
            }
            // Each run gets its own child seed so one campaign covers
            // distinct tails while staying reproducible.
            let source = ChoiceSource::seeded(
                Vec::new(),
                seed.wrapping_add(run),
                self.config.max_choices_per_path,
            );
            let result = self.scheduler.run_path(source)?;
            tally.record(result);
        }

        tally.exhausted = tally.paths_run == runs;
        Ok(tally.into_report())
    }
}

/// Running campaign counters.
#[derive(Default)]
struct Tally {
    paths_run: u64,
    clean: u64,
    violations: u64,
    truncated: u64,
    seen: BTreeSet<Vec<u64>>,
    exhausted: bool,
    counterexamples: Vec<Counterexample>,
}

impl Tally {
    fn record(&mut self, result: PathResult) {
        let path_id = self.paths_run;
        self.paths_run += 1;

        // Independent re-check of the recorded trace against the
        // lifecycle rules.  The live bookkeeping and the verifier must
        // agree; if they ever do not, the sterner verdict wins and the
        // disagreement is loud.
        let completed = result.status == PathStatus::Completed;
        let recheck = verify(&result.trace, completed);
        if recheck != result.verdict {
            warn!(
                "trace verifier disagrees with live bookkeeping on path {path_id}: \
                 live={:?} recheck={:?}",
                result.verdict, recheck
            );
        }
        let verdict = if recheck.is_violation() {
            recheck
        } else {
            result.verdict.clone()
        };

        if result.status == PathStatus::Truncated {
            self.truncated += 1;
        }
        self.seen.insert(result.choices.ordinals());

        if verdict.is_violation() {
            self.violations += 1;
            debug!("path {path_id} violated: {verdict:?}");
            self.counterexamples.push(Counterexample {
                path_id,
                choices: result.choices,
                trace: result.trace,
                verdict,
            });
        } else {
            self.clean += 1;
        }
    }

    fn into_report(self) -> ExplorationReport {
        ExplorationReport {
            paths_run: self.paths_run,
            clean: self.clean,
            violations: self.violations,
            truncated: self.truncated,
            distinct_paths: self.seen.len() as u64,
            exhausted: self.exhausted,
            counterexamples: self.counterexamples,
        }
    }
}

/// Depth-first backtracking: the deepest branch point with an untried
/// ordinal, with everything above it pinned.
///
/// Returns `None` when every ordinal of every record is exhausted — the
/// whole tree has been enumerated.
fn next_prefix(records: &[ChoiceRecord]) -> Option<Vec<u64>> {
    for (i, record) in records.iter().enumerate().rev() {
        if record.ordinal + 1 < record.n_options {
            let mut prefix: Vec<u64> = records[..i].iter().map(|r| r.ordinal).collect();
            prefix.push(record.ordinal + 1);
            return Some(prefix);
        }
    }
    None
}
