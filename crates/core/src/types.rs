//! Gemeinsame Identifikations- und Snapshot-Typen fuer Grussbot
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Die Werte sind
//! die numerischen Snowflakes der Chat-Plattform.

use serde::{Deserialize, Serialize};

/// Eindeutige Sitzungs-ID (eine Sitzung pro Guild/Raum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Gibt den inneren Snowflake zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Eindeutige Kanal-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl ChannelId {
    /// Gibt den inneren Snowflake zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "channel:{}", self.0)
    }
}

/// Eindeutige Mitglieds-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl MemberId {
    /// Gibt den inneren Snowflake zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "member:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Mitglied
// ---------------------------------------------------------------------------

/// Ein Mitglied einer Sitzung, wie es das Gateway meldet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mitglied {
    pub id: MemberId,
    /// Benutzername (fuer Logs)
    pub name: String,
    /// Anzeigename in der Sitzung (fuer die Begruessung)
    #[serde(default)]
    pub anzeigename: String,
    /// Automatisierter Teilnehmer?
    #[serde(default)]
    pub ist_bot: bool,
}

impl Mitglied {
    /// Erstellt ein menschliches Mitglied, Anzeigename = Benutzername
    pub fn neu(id: u64, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: MemberId(id),
            anzeigename: name.clone(),
            name,
            ist_bot: false,
        }
    }

    /// Erstellt einen Bot-Teilnehmer
    pub fn bot(id: u64, name: impl Into<String>) -> Self {
        Self {
            ist_bot: true,
            ..Self::neu(id, name)
        }
    }

    /// Name fuer die Begruessung; faellt auf den Benutzernamen zurueck
    pub fn begruessungsname(&self) -> &str {
        if self.anzeigename.trim().is_empty() {
            &self.name
        } else {
            &self.anzeigename
        }
    }
}

// ---------------------------------------------------------------------------
// Kanal
// ---------------------------------------------------------------------------

/// Read-only Snapshot eines Sprachkanals zum Zeitpunkt des Ereignisses
///
/// `mitglieder` enthaelt die Belegung *nach* dem Uebergang.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kanal {
    pub id: ChannelId,
    pub name: String,
    #[serde(default)]
    pub mitglieder: Vec<Mitglied>,
}

impl Kanal {
    /// Erstellt einen Snapshot
    pub fn neu(id: u64, name: impl Into<String>, mitglieder: Vec<Mitglied>) -> Self {
        Self {
            id: ChannelId(id),
            name: name.into(),
            mitglieder,
        }
    }

    /// Anzahl der Teilnehmer im Snapshot
    pub fn anzahl(&self) -> usize {
        self.mitglieder.len()
    }

    /// Ist mindestens ein Mensch im Kanal?
    pub fn hat_menschen(&self) -> bool {
        self.mitglieder.iter().any(|m| !m.ist_bot)
    }

    /// Sind alle Teilnehmer Bots? (leerer Kanal zaehlt als `true`)
    pub fn nur_bots(&self) -> bool {
        self.mitglieder.iter().all(|m| m.ist_bot)
    }

    /// Ist `id` der einzige Teilnehmer?
    pub fn nur(&self, id: MemberId) -> bool {
        self.mitglieder.len() == 1 && self.mitglieder[0].id == id
    }

    /// Ist `id` im Kanal?
    pub fn enthaelt(&self, id: MemberId) -> bool {
        self.mitglieder.iter().any(|m| m.id == id)
    }
}
