//! Run and execution types.

use crate::event::{BuildStatus, Event};
use crate::ids::RunId;
use crate::pipeline::PipelineDefinition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Terminal status of a pipeline within one build, as kept in the status
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Succeeded,
    Failed,
    /// Dependencies finished but the trigger predicate rejected the event.
    Skipped,
}

impl PipelineStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, PipelineStatus::Failed)
    }

    /// The value exposed to dependents through the `status` category.
    pub fn as_build_status(&self) -> BuildStatus {
        match self {
            PipelineStatus::Failed => BuildStatus::Failure,
            PipelineStatus::Succeeded | PipelineStatus::Skipped => BuildStatus::Success,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStatus::Succeeded => "succeeded",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Skipped => "skipped",
        })
    }
}

/// One entry of the status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub pipeline: String,
    pub status: PipelineStatus,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }

    pub fn terminal_status(&self) -> Option<PipelineStatus> {
        match self {
            RunPhase::Succeeded => Some(PipelineStatus::Succeeded),
            RunPhase::Failed => Some(PipelineStatus::Failed),
            RunPhase::Pending | RunPhase::Running => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    /// `ignored` is set when the step's failure policy let the run continue.
    Failed { ignored: bool },
    Skipped,
}

impl StepStatus {
    /// Whether this outcome fails the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StepStatus::Failed { ignored: false })
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed { ignored: false } => "failed",
            StepStatus::Failed { ignored: true } => "failed (ignored)",
            StepStatus::Skipped => "skipped",
        })
    }
}

/// Why a step failed, when it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum StepFailure {
    /// The container exited non-zero.
    ExitCode(i32),
    /// A `from_secret` reference could not be resolved.
    SecretResolutionFailed(String),
    /// The container runtime itself failed.
    Runtime(String),
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepFailure::ExitCode(code) => write!(f, "exit code {}", code),
            StepFailure::SecretResolutionFailed(msg) => write!(f, "secret resolution failed: {}", msg),
            StepFailure::Runtime(msg) => write!(f, "runtime error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,
    pub status: StepStatus,
    pub failure: Option<StepFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl StepOutcome {
    pub fn duration_ms(&self) -> u64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// A runtime instance of one pipeline for one event.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub id: RunId,
    pub definition: Arc<PipelineDefinition>,
    pub event: Event,
    pub phase: RunPhase,
    pub steps: Vec<StepOutcome>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(definition: Arc<PipelineDefinition>, event: Event) -> Self {
        Self {
            id: RunId::new(),
            definition,
            event,
            phase: RunPhase::Pending,
            steps: vec![],
            started_at: None,
            completed_at: None,
        }
    }

    pub fn pipeline_name(&self) -> &str {
        &self.definition.name
    }

    pub fn start(&mut self) {
        self.phase = RunPhase::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn record_step(&mut self, outcome: StepOutcome) {
        self.steps.push(outcome);
    }

    /// Settle the final phase from the recorded step outcomes.
    pub fn finish(&mut self) -> PipelineStatus {
        self.phase = if self.steps.iter().any(|s| s.status.is_fatal()) {
            RunPhase::Failed
        } else {
            RunPhase::Succeeded
        };
        self.completed_at = Some(Utc::now());
        if self.started_at.is_none() {
            self.started_at = self.completed_at;
        }
        self.status()
    }

    /// Status seen by `when` gates while the run is in progress.
    pub fn current_status(&self) -> PipelineStatus {
        if self.steps.iter().any(|s| s.status.is_fatal()) {
            PipelineStatus::Failed
        } else {
            PipelineStatus::Succeeded
        }
    }

    /// Terminal status; `Failed` if the run has not finished.
    pub fn status(&self) -> PipelineStatus {
        self.phase.terminal_status().unwrap_or(PipelineStatus::Failed)
    }

    pub fn step(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }
}
