//! Container-based step execution using Docker.

use crate::runner::{OutputStream, RuntimeConfig, shell_script};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use drover_core::ports::{ContainerRuntime, ExecRequest};
use drover_core::{Error, Result};
use futures::StreamExt;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

/// Mount point of the run workspace inside every step container.
pub const WORKSPACE_PATH: &str = "/drover/src";

/// Docker container runtime. Each step gets a fresh container that is
/// removed once the step finishes.
pub struct DockerRuntime {
    docker: Docker,
    config: RuntimeConfig,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::Runtime(format!("failed to connect to Docker: {}", e)))?;

        Ok(Self { docker, config })
    }

    /// Create with an existing Docker client.
    pub fn with_docker(docker: Docker, config: RuntimeConfig) -> Self {
        Self { docker, config }
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        info!(image = %image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(item) = progress.next().await {
            item.map_err(|e| Error::Runtime(format!("failed to pull {}: {}", image, e)))?;
        }
        Ok(())
    }

    async fn run_container(&self, name: &str, request: &ExecRequest) -> Result<i32> {
        let container_config = Config {
            image: Some(request.image.clone()),
            entrypoint: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
            cmd: Some(vec![shell_script(&request.commands)]),
            env: Some(request.env.to_pairs()),
            working_dir: Some(WORKSPACE_PATH.to_string()),
            host_config: Some(bollard::models::HostConfig {
                binds: Some(vec![format!(
                    "{}:{}",
                    request.workspace.display(),
                    WORKSPACE_PATH
                )]),
                auto_remove: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name,
                    platform: None,
                }),
                container_config,
            )
            .await
            .map_err(|e| Error::Runtime(format!("failed to create container: {}", e)))?;

        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| Error::Runtime(format!("failed to start container: {}", e)))?;

        let log_options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut logs = self.docker.logs(name, Some(log_options));
        while let Some(entry) = logs.next().await {
            let (stream, message) = match entry {
                Ok(LogOutput::StdOut { message }) => (OutputStream::Stdout, message),
                Ok(LogOutput::StdErr { message }) => (OutputStream::Stderr, message),
                Ok(_) => continue,
                Err(e) => {
                    warn!(container = %name, error = %e, "Error reading container logs");
                    break;
                }
            };
            let text = String::from_utf8_lossy(&message);
            info!(
                pipeline = %request.pipeline,
                step = %request.step,
                stream = stream.as_str(),
                "{}",
                request.env.mask(text.trim_end())
            );
        }

        let wait_options = WaitContainerOptions {
            condition: "not-running",
        };
        match self
            .docker
            .wait_container(name, Some(wait_options))
            .next()
            .await
        {
            Some(Ok(response)) => Ok(response.status_code as i32),
            // bollard reports non-zero exits as a wait error carrying the code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                Ok(code as i32)
            }
            Some(Err(e)) => Err(Error::Runtime(format!("container wait failed: {}", e))),
            None => Err(Error::Runtime("container wait returned no result".to_string())),
        }
    }

    async fn remove(&self, name: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(name, Some(options)).await {
            warn!(container = %name, error = %e, "Failed to remove container");
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn execute(&self, request: &ExecRequest) -> Result<i32> {
        if self.config.pull_images {
            self.ensure_image(&request.image).await?;
        }

        let name = format!("drover-{}", uuid::Uuid::new_v4().simple());
        debug!(container = %name, image = %request.image, "Starting step container");

        let result = match self.config.timeout_seconds {
            Some(secs) => match timeout(Duration::from_secs(secs), self.run_container(&name, request)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(container = %name, timeout_secs = secs, "Step timed out, killing container");
                    let _ = self.docker.kill_container::<String>(&name, None).await;
                    Err(Error::Runtime(format!("step timed out after {}s", secs)))
                }
            },
            None => self.run_container(&name, request).await,
        };

        self.remove(&name).await;

        if let Ok(code) = &result {
            debug!(container = %name, exit_code = *code, "Step container exited");
        }
        result
    }

    fn name(&self) -> &str {
        "docker"
    }
}
