//! Track-Anfragen
//!
//! Eine [`TrackAnfrage`] ist eine undurchsichtige Kennung, die ein
//! [`AudioAufloeser`](crate::AudioAufloeser) in eine Frame-Quelle uebersetzt.
//! Sample-Kennungen sind Dateipfade, Sprach-Kennungen tragen das Schema
//! `speech://` gefolgt vom URL-kodierten Text (Leerzeichen als `%20`).

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Schema-Praefix fuer Sprachsynthese-Kennungen
pub const SPRACH_SCHEMA: &str = "speech://";

/// Herkunft eines Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuellenArt {
    /// Lokale Sample-Datei
    Sample,
    /// Text-zu-Sprache
    Sprache,
}

/// Anfrage fuer genau einen abspielbaren Track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackAnfrage {
    kennung: String,
    art: QuellenArt,
}

impl TrackAnfrage {
    /// Sample aus einer lokalen Datei
    pub fn sample(pfad: impl AsRef<Path>) -> Self {
        Self {
            kennung: pfad.as_ref().to_string_lossy().into_owned(),
            art: QuellenArt::Sample,
        }
    }

    /// Sprachsynthese fuer `text`
    pub fn sprache(text: &str) -> Self {
        Self {
            kennung: format!("{SPRACH_SCHEMA}{}", urlencoding::encode(text)),
            art: QuellenArt::Sprache,
        }
    }

    /// Rekonstruiert eine Anfrage aus ihrer Kennung
    pub fn aus_kennung(kennung: impl Into<String>) -> Self {
        let kennung = kennung.into();
        let art = if kennung.starts_with(SPRACH_SCHEMA) {
            QuellenArt::Sprache
        } else {
            QuellenArt::Sample
        };
        Self { kennung, art }
    }

    pub fn kennung(&self) -> &str {
        &self.kennung
    }

    pub fn art(&self) -> QuellenArt {
        self.art
    }

    /// Dekodierter Text einer Sprach-Anfrage
    pub fn sprachtext(&self) -> Option<String> {
        let kodiert = self.kennung.strip_prefix(SPRACH_SCHEMA)?;
        urlencoding::decode(kodiert).ok().map(|t| t.into_owned())
    }

    /// Kurzname fuer Logs und Antworten (Dateiname ohne Endung)
    pub fn anzeigename(&self) -> String {
        match self.art {
            QuellenArt::Sprache => self.sprachtext().unwrap_or_else(|| self.kennung.clone()),
            QuellenArt::Sample => Path::new(&self.kennung)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.kennung.clone()),
        }
    }
}

impl std::fmt::Display for TrackAnfrage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.kennung)
    }
}
