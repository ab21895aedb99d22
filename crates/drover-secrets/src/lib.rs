//! Secret resolution for Drover.
//!
//! `from_secret` references are resolved through an ordered chain of
//! providers right before a step runs.

pub mod http;
pub mod providers;
pub mod resolver;

pub use drover_core::ports::SecretProvider;
pub use drover_core::secrets::{SecretValue, StepEnvironment};
pub use http::{HttpProvider, HttpProviderConfig};
pub use providers::{EnvProvider, FileProvider};
pub use resolver::SecretResolver;
