//! Fehlertypen fuer den Anwesenheits-Automaten

use grussbot_audio::AudioError;
use grussbot_core::SessionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Transportfehler: {0}")]
    Transport(String),

    #[error("Kanal nicht erlaubt: {0}")]
    KanalNichtErlaubt(String),

    #[error("Kanalliste nicht verfuegbar: {0}")]
    Kanalliste(String),

    #[error("Sitzung nicht gefunden: {0}")]
    SitzungNichtGefunden(SessionId),

    #[error("Audiofehler: {0}")]
    Audio(#[from] AudioError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type VoiceResult<T> = Result<T, VoiceError>;
