//! Fehlertypen fuer Grussbot
//!
//! Zentraler Fehler-Enum fuer die aeusseren Schichten (Befehle, Gateway).
//! Audio- und Voice-Crate definieren eigene Fehler; der Server konvertiert
//! sie bei Bedarf ueber `to_string()` in diesen Typ.

use thiserror::Error;

/// Globaler Result-Alias fuer Grussbot
pub type Result<T> = std::result::Result<T, GrussbotError>;

/// Alle Fehler der aeusseren Schichten
#[derive(Debug, Error)]
pub enum GrussbotError {
    // --- Verbindung ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Kanal gesperrt: {0}")]
    KanalGesperrt(String),

    #[error("Mitglied ist in keinem Sprachkanal")]
    KeinSprachkanal,

    // --- Befehle ---
    #[error("Unbekannter Befehl: {0}")]
    UnbekannterBefehl(String),

    #[error("Fehlendes Argument fuer '{befehl}': {argument}")]
    FehlendesArgument { befehl: String, argument: String },

    #[error("Zugriff verweigert: {0}")]
    ZugriffVerweigert(String),

    #[error("Sample nicht gefunden: {0}")]
    SampleNichtGefunden(String),

    // --- Audio ---
    #[error("Audiofehler: {0}")]
    Audio(String),

    // --- Gateway ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl GrussbotError {
    /// Fehler die dem Aufrufer als Hinweis (nicht als Stoerung) gemeldet werden
    pub fn ist_benutzerfehler(&self) -> bool {
        matches!(
            self,
            Self::KanalGesperrt(_)
                | Self::KeinSprachkanal
                | Self::UnbekannterBefehl(_)
                | Self::FehlendesArgument { .. }
                | Self::ZugriffVerweigert(_)
                | Self::SampleNichtGefunden(_)
        )
    }
}
