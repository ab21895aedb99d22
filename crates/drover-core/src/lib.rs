//! Drover Core
//!
//! Domain types, pattern matching, trigger evaluation and the port traits
//! shared by the runner, scheduler and CLI crates. Nothing in here performs
//! I/O besides reading definition files in [`loader`].

pub mod error;
pub mod event;
pub mod ids;
pub mod loader;
pub mod pattern;
pub mod pipeline;
pub mod ports;
pub mod run;
pub mod secrets;
pub mod trigger;

pub use error::{Error, Result};
pub use ids::*;
