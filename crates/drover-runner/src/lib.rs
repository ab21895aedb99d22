//! Step execution for Drover.
//!
//! [`StepRunner`] walks a pipeline's steps in order and hands each one to a
//! [`ContainerRuntime`](drover_core::ports::ContainerRuntime): Docker via
//! [`DockerRuntime`] or the host shell via [`ShellRuntime`].

pub mod container;
pub mod runner;
pub mod shell;

pub use container::DockerRuntime;
pub use runner::{RunnerConfig, RuntimeConfig, StepRunner, shell_script};
pub use shell::ShellRuntime;
