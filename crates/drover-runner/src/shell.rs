//! Shell-based step execution on the host.
//!
//! The step image is ignored; commands run under `sh` in the run workspace.
//! Useful for local runs where Docker is not available.

use crate::runner::{OutputStream, RuntimeConfig, shell_script};
use async_trait::async_trait;
use drover_core::ports::{ContainerRuntime, ExecRequest};
use drover_core::{Error, Result};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

/// Host shell runtime.
pub struct ShellRuntime {
    config: RuntimeConfig,
}

impl ShellRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }
}

impl Default for ShellRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, request: &ExecRequest)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(
            pipeline = %request.pipeline,
            step = %request.step,
            stream = stream.as_str(),
            "{}",
            request.env.mask(&line)
        );
    }
}

#[async_trait]
impl ContainerRuntime for ShellRuntime {
    async fn execute(&self, request: &ExecRequest) -> Result<i32> {
        debug!(
            step = %request.step,
            workspace = %request.workspace.display(),
            "Executing step in host shell"
        );

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(shell_script(&request.commands))
            .current_dir(&request.workspace)
            .envs(request.env.iter())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Runtime(format!("failed to spawn shell: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("child stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("child stderr not captured".to_string()))?;

        let run = async {
            let (_, _, status) = tokio::join!(
                forward_lines(stdout, OutputStream::Stdout, request),
                forward_lines(stderr, OutputStream::Stderr, request),
                child.wait()
            );
            status
        };

        let status = match self.config.timeout_seconds {
            Some(secs) => match timeout(Duration::from_secs(secs), run).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(step = %request.step, timeout_secs = secs, "Step timed out, killing process");
                    return Err(Error::Runtime(format!("step timed out after {}s", secs)));
                }
            },
            None => run.await,
        }
        .map_err(|e| Error::Runtime(format!("failed to wait for shell: {}", e)))?;

        // No code when the process was killed by a signal.
        let exit_code = status.code().unwrap_or(-1);
        debug!(step = %request.step, exit_code, "Shell step completed");
        Ok(exit_code)
    }

    fn name(&self) -> &str {
        "shell"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::secrets::{SecretValue, StepEnvironment};

    fn request(dir: &std::path::Path, commands: &[&str], env: StepEnvironment) -> ExecRequest {
        ExecRequest {
            pipeline: "main".to_string(),
            step: "build".to_string(),
            image: "ignored".to_string(),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            env,
            workspace: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = ShellRuntime::default();

        let code = runtime
            .execute(&request(dir.path(), &["echo hello"], StepEnvironment::new()))
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_first_failure_stops_script() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = ShellRuntime::default();

        let code = runtime
            .execute(&request(
                dir.path(),
                &["exit 3", "touch should-not-exist"],
                StepEnvironment::new(),
            ))
            .await
            .unwrap();
        assert_eq!(code, 3);
        assert!(!dir.path().join("should-not-exist").exists());
    }

    #[tokio::test]
    async fn test_environment_reaches_commands() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = ShellRuntime::default();
        let mut env = StepEnvironment::new();
        env.set("GREETING", "hi");
        env.set_secret("TOKEN", SecretValue::new("s3cr3t"));

        let code = runtime
            .execute(&request(
                dir.path(),
                &["test \"$GREETING\" = hi", "test \"$TOKEN\" = s3cr3t"],
                env,
            ))
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_timeout_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = ShellRuntime::new(RuntimeConfig {
            timeout_seconds: Some(1),
            pull_images: false,
        });

        let err = runtime
            .execute(&request(dir.path(), &["sleep 5"], StepEnvironment::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
    }
}
