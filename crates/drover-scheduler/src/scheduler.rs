//! Dispatch loop: turns one event into a set of pipeline runs.

use crate::dag::{Candidate, DependencyGraph};
use chrono::{DateTime, Utc};
use drover_core::event::Event;
use drover_core::ports::StatusStore;
use drover_core::run::{PipelineRun, PipelineStatus, StatusRecord};
use drover_core::{Error, Result};
use drover_runner::StepRunner;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently executing pipeline runs.
    #[serde(default)]
    pub max_parallel: Option<usize>,
}

/// Outcome of one pipeline within a dispatch.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub name: String,
    pub status: PipelineStatus,
    /// Present when the pipeline was executed in this dispatch.
    pub run: Option<PipelineRun>,
    /// The status came from a previous dispatch of the same build.
    pub resumed: bool,
}

/// Result of dispatching one event.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub build_number: u64,
    /// Pipelines in the order their status was recorded.
    pub pipelines: Vec<PipelineReport>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl DispatchReport {
    pub fn status_of(&self, name: &str) -> Option<PipelineStatus> {
        self.get(name).map(|p| p.status)
    }

    pub fn get(&self, name: &str) -> Option<&PipelineReport> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// The build fails when any pipeline failed.
    pub fn is_success(&self) -> bool {
        !self.pipelines.iter().any(|p| p.status.is_failure())
    }

    pub fn failed(&self) -> impl Iterator<Item = &PipelineReport> {
        self.pipelines.iter().filter(|p| p.status.is_failure())
    }

    pub fn duration_ms(&self) -> u64 {
        (self.completed_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Result of one spawned run; `None` when the run task panicked.
type Finished = (String, Option<PipelineRun>);

/// Owns the dependency graph and is the only writer of its status table.
pub struct Scheduler {
    graph: DependencyGraph,
    runner: Arc<StepRunner>,
    store: Option<Arc<dyn StatusStore>>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(graph: DependencyGraph, runner: Arc<StepRunner>, config: SchedulerConfig) -> Self {
        Self {
            graph,
            runner,
            store: None,
            config,
        }
    }

    /// Persist status records through `store` and resume builds it already
    /// holds records for. Without a store every dispatch starts fresh.
    pub fn with_store(mut self, store: Arc<dyn StatusStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Run every pipeline the event reaches, honouring dependencies.
    ///
    /// With a store attached, statuses already stored for the event's build
    /// number are restored first; those pipelines are not run again.
    pub async fn dispatch(&mut self, event: Event) -> Result<DispatchReport> {
        let started_at = Utc::now();
        let build_number = event.build_number;
        self.graph.validate()?;
        self.graph.reset();

        let mut reports = Vec::new();
        let stored = match &self.store {
            Some(store) => store.load(build_number).await?,
            None => Vec::new(),
        };
        if !stored.is_empty() {
            let restored = self.graph.restore(&stored)?;
            info!(build = build_number, restored, "Resuming build from stored statuses");
            for record in stored.iter().filter(|r| self.graph.get(&r.pipeline).is_some()) {
                reports.push(PipelineReport {
                    name: record.pipeline.clone(),
                    status: record.status,
                    run: None,
                    resumed: true,
                });
            }
        }

        info!(
            build = build_number,
            event = %event.kind,
            branch = ?event.branch,
            pipelines = self.graph.len(),
            "Dispatching event"
        );

        let limit = self.config.max_parallel.unwrap_or(usize::MAX).max(1);
        let mut started: HashSet<String> = HashSet::new();
        let mut pending: VecDeque<Candidate> = VecDeque::new();
        let mut in_flight: JoinSet<Finished> = JoinSet::new();

        loop {
            let mut skipped_any = false;
            for candidate in self.graph.evaluate(&event) {
                if started.contains(candidate.name()) {
                    continue;
                }
                started.insert(candidate.name().to_string());

                if candidate.is_admitted() {
                    debug!(pipeline = %candidate.name(), "Pipeline ready");
                    pending.push_back(candidate);
                } else {
                    info!(pipeline = %candidate.name(), verdict = ?candidate.verdict, "Skipping pipeline");
                    let record = self.graph.record(candidate.name(), PipelineStatus::Skipped)?;
                    self.persist(build_number, &record).await;
                    reports.push(PipelineReport {
                        name: record.pipeline,
                        status: PipelineStatus::Skipped,
                        run: None,
                        resumed: false,
                    });
                    skipped_any = true;
                }
            }

            // A skip can make dependents ready without any run finishing.
            if skipped_any {
                continue;
            }

            while in_flight.len() < limit {
                let Some(candidate) = pending.pop_front() else {
                    break;
                };
                self.spawn(&mut in_flight, candidate);
            }

            if in_flight.is_empty() {
                break;
            }

            let (name, run) = match in_flight.join_next().await {
                Some(Ok(finished)) => finished,
                Some(Err(e)) => {
                    return Err(Error::Internal(format!("pipeline task failed: {}", e)));
                }
                None => break,
            };

            let status = match &run {
                Some(run) => run.status(),
                None => {
                    error!(pipeline = %name, "Pipeline run panicked");
                    PipelineStatus::Failed
                }
            };
            let record = self.graph.record(&name, status)?;
            self.persist(build_number, &record).await;
            reports.push(PipelineReport {
                name,
                status,
                run,
                resumed: false,
            });
        }

        if !self.graph.is_settled() {
            warn!(build = build_number, "Dispatch finished with unrecorded pipelines");
        }

        let report = DispatchReport {
            build_number,
            pipelines: reports,
            started_at,
            completed_at: Utc::now(),
        };
        info!(
            build = build_number,
            success = report.is_success(),
            duration_ms = report.duration_ms(),
            "Dispatch finished"
        );
        Ok(report)
    }

    fn spawn(&self, in_flight: &mut JoinSet<Finished>, candidate: Candidate) {
        let runner = Arc::clone(&self.runner);
        let name = candidate.name().to_string();
        info!(pipeline = %name, "Starting pipeline");

        in_flight.spawn(async move {
            let mut run = PipelineRun::new(candidate.definition, candidate.event);
            let result = AssertUnwindSafe(async {
                runner.run(&mut run).await;
            })
            .catch_unwind()
            .await;
            (name, result.ok().map(|_| run))
        });
    }

    /// The in-memory record stays authoritative for this dispatch when the
    /// store rejects a write.
    async fn persist(&self, build_number: u64, record: &StatusRecord) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(build_number, record).await {
            error!(
                build = build_number,
                pipeline = %record.pipeline,
                error = %e,
                "Failed to persist pipeline status"
            );
        }
    }
}
