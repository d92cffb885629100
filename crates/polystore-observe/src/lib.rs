//! # Polystore Observe - Observability Layer
//!
//! Structured logging for the data-access workspace.

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};
