//! # grussbot-observability
//!
//! Structured Logging (text oder JSON) via tracing-subscriber.

pub mod logging;

pub use logging::logging_initialisieren;
