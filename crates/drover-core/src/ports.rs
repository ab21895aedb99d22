//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the orchestration core and
//! its external collaborators.

use crate::Result;
use crate::run::StatusRecord;
use crate::secrets::{SecretValue, StepEnvironment};
use async_trait::async_trait;
use std::path::PathBuf;

/// Everything a container runtime needs to execute one step.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub pipeline: String,
    pub step: String,
    pub image: String,
    pub commands: Vec<String>,
    pub env: StepEnvironment,
    pub workspace: PathBuf,
}

/// Executes a step's commands inside a container image.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Run the commands and return the exit status.
    ///
    /// A non-zero status is a normal outcome; `Err` means the runtime itself
    /// could not run the step.
    async fn execute(&self, request: &ExecRequest) -> Result<i32>;

    /// Runtime name for logging.
    fn name(&self) -> &str;
}

/// External store that resolves secret names to values.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Get a secret by name.
    ///
    /// Fails with `SecretNotFound` when the store does not know the name and
    /// with `SecretAccess` when the store cannot be reached.
    async fn get(&self, name: &str) -> Result<SecretValue>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Durable status table, keyed by build number.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Records already stored for a build.
    async fn load(&self, build_number: u64) -> Result<Vec<StatusRecord>>;

    /// Persist one terminal status.
    async fn save(&self, build_number: u64, record: &StatusRecord) -> Result<()>;
}
