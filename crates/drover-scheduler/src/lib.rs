//! Pipeline scheduling for Drover.
//!
//! [`DependencyGraph`] holds the pipelines of a build and their `depends_on`
//! edges; [`Scheduler::dispatch`] drives them to completion for one event.

pub mod dag;
pub mod scheduler;
pub mod store;

pub use dag::{Candidate, DependencyGraph};
pub use scheduler::{DispatchReport, PipelineReport, Scheduler, SchedulerConfig};
pub use store::{JsonFileStatusStore, MemoryStatusStore};
