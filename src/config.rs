//! Allocator configuration and scripted runs
//!
//! A script is a TOML document describing a domain and a sequence of
//! operations to replay against it:
//!
//! ```toml
//! verify = true
//!
//! [allocator]
//! start = 1
//! length = 100
//!
//! [[step]]
//! op = "alloc"
//! length = 10
//!
//! [[step]]
//! op = "dealloc"
//! start = 1
//! ```

use crate::allocator::{MergeCase, RangeAllocator};
use crate::diagnostics::Snapshot;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Domain of a [`RangeAllocator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorConfig {
    /// First index of the domain (must be positive)
    pub start: u64,
    /// Number of indices in the domain (must be positive)
    pub length: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            start: 1,
            length: 100,
        }
    }
}

impl AllocatorConfig {
    pub fn build(&self) -> Result<RangeAllocator> {
        RangeAllocator::create(self.start, self.length)
    }
}

/// One scripted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Step {
    Alloc { length: u64 },
    Dealloc { start: u64 },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Alloc { length } => write!(f, "alloc {length}"),
            Step::Dealloc { start } => write!(f, "dealloc {start}"),
        }
    }
}

/// Result of applying a single [`Step`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Outcome {
    Allocated { start: u64 },
    Freed { merge: MergeCase },
    Failed { error: String },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allocated { start } => write!(f, "allocated at {start}"),
            Outcome::Freed { merge } => write!(f, "freed ({merge:?} merge)"),
            Outcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub step: Step,
    pub outcome: Outcome,
    pub snapshot: Snapshot,
}

/// Everything a scripted run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRun {
    pub initial: Snapshot,
    pub steps: Vec<StepReport>,
}

impl ScriptRun {
    /// State after the last step, or the initial state for an empty script
    pub fn final_snapshot(&self) -> &Snapshot {
        self.steps
            .last()
            .map(|report| &report.snapshot)
            .unwrap_or(&self.initial)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Check allocator invariants after every step
    #[serde(default)]
    pub verify: bool,

    #[serde(default)]
    pub allocator: AllocatorConfig,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read a script from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let script = Self::from_toml_str(&source)?;
        debug!(path = %path.display(), steps = script.steps.len(), "loaded script");
        Ok(script)
    }

    /// Built-in walkthrough over `1..=100`
    ///
    /// Fills the domain with allocations of growing size, punches holes that
    /// exercise every merge case, then reallocates into a pair of equal-length
    /// gaps.
    pub fn demo() -> Self {
        let mut steps: Vec<Step> = (1..=9).map(|length| Step::Alloc { length }).collect();
        steps.extend([Step::Alloc { length: 29 }, Step::Alloc { length: 26 }]);
        steps.extend([4, 11, 22, 29, 16, 1, 75].map(|start| Step::Dealloc { start }));
        steps.extend([Step::Alloc { length: 26 }, Step::Alloc { length: 26 }]);
        steps.extend([75, 11, 7].map(|start| Step::Dealloc { start }));

        Script {
            verify: true,
            allocator: AllocatorConfig::default(),
            steps,
        }
    }

    /// Replay the script against a fresh allocator
    ///
    /// Failed steps are recorded and the run carries on. Only building the
    /// allocator, or a failed invariant check when `verify` is set, ends it early.
    pub fn run(&self) -> Result<ScriptRun> {
        let mut allocator = self.allocator.build()?;
        let initial = allocator.snapshot();
        let mut steps = Vec::with_capacity(self.steps.len());

        for (number, step) in self.steps.iter().enumerate() {
            let result = match *step {
                Step::Alloc { length } => allocator
                    .alloc(length)
                    .map(|start| Outcome::Allocated { start }),
                Step::Dealloc { start } => allocator
                    .dealloc(start)
                    .map(|merge| Outcome::Freed { merge }),
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(err) if err.is_recoverable() => Outcome::Failed {
                    error: err.to_string(),
                },
                Err(err) => return Err(err),
            };
            info!(index = number + 1, %step, %outcome, "applied step");

            if self.verify {
                allocator.check_invariants()?;
            }
            steps.push(StepReport {
                step: *step,
                outcome,
                snapshot: allocator.snapshot(),
            });
        }

        Ok(ScriptRun { initial, steps })
    }
}
