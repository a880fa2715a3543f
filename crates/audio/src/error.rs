//! Fehlertypen fuer die Wiedergabe-Engine

use thiserror::Error;

/// Alle moeglichen Fehler der Wiedergabe-Engine
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audioquelle nicht gefunden: {0}")]
    QuelleNichtGefunden(String),

    #[error("Track '{kennung}' konnte nicht geladen werden: {grund}")]
    Laden { kennung: String, grund: String },

    #[error("Demux-Fehler: {0}")]
    Demux(String),

    #[error("Dekoder-Thread nicht verfuegbar: {0}")]
    Dekoder(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;
