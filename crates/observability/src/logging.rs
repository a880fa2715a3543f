//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `GB_LOG_LEVEL`: Filter (z.B. `info` oder `grussbot_voice=debug,info`), Standard: info
//! - `GB_LOG_FORMAT`: Format (text/json), Standard: text
//!
//! Die Umgebungsvariablen haben Vorrang vor der Konfigurationsdatei.

use tracing_subscriber::{EnvFilter, fmt};

pub const LEVEL_VARIABLE: &str = "GB_LOG_LEVEL";
pub const FORMAT_VARIABLE: &str = "GB_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// `level` und `format` stammen aus der Konfiguration und werden von
/// `GB_LOG_LEVEL` / `GB_LOG_FORMAT` uebersteuert. Ein ungueltiger Filter
/// faellt auf `info` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LEVEL_VARIABLE)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = log_format_aus_env().unwrap_or_else(|| format.to_string());

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_names(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_names(true)
                .init();
        }
    }
}

/// Log-Format aus der Umgebung, falls gesetzt
pub fn log_format_aus_env() -> Option<String> {
    std::env::var(FORMAT_VARIABLE).ok().filter(|f| !f.is_empty())
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
