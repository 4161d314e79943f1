//! # geheimpost-observability
//!
//! Structured Logging fuer Server und Client via tracing-subscriber.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat, LOG_FORMAT_ENV, LOG_LEVEL_ENV};
