//! Zugangspruefung – Kanalliste und reservierter Kanal
//!
//! Die Kanalliste fuehrt die Namen gesperrter Kanaele, einer pro Zeile,
//! ohne Emoji. Verglichen wird exakt (Gross-/Kleinschreibung zaehlt).
//! Ist die Liste nicht lesbar, gilt der Kanal als erlaubt.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use grussbot_core::{ChannelId, Kanal};
use parking_lot::RwLock;

use crate::error::VoiceResult;

/// Ersatzname fuer Kanaele, deren Name nur aus Emoji besteht
pub const STANDARD_ERSATZNAME: &str = "Sprachkanal";

/// Persistente Liste gesperrter Kanalnamen
pub trait KanalListe: Send + Sync {
    fn enthaelt(&self, name: &str) -> VoiceResult<bool>;

    /// Fuegt `name` hinzu (No-op wenn vorhanden)
    fn hinzufuegen(&self, name: &str) -> VoiceResult<()>;

    /// Entfernt `name`; `true` wenn er vorhanden war
    fn entfernen(&self, name: &str) -> VoiceResult<bool>;
}

// ---------------------------------------------------------------------------
// Datei-Backend
// ---------------------------------------------------------------------------

/// Zeilenorientierte Textdatei
///
/// Lesen parallel, Schreiben exklusiv. Eine fehlende Datei ist eine leere
/// Liste.
pub struct DateiKanalListe {
    pfad: PathBuf,
    sperre: RwLock<()>,
}

impl DateiKanalListe {
    pub fn neu(pfad: impl Into<PathBuf>) -> Self {
        Self {
            pfad: pfad.into(),
            sperre: RwLock::new(()),
        }
    }

    pub fn pfad(&self) -> &Path {
        &self.pfad
    }

    fn zeilen_lesen(&self) -> VoiceResult<Vec<String>> {
        match std::fs::read_to_string(&self.pfad) {
            Ok(inhalt) => Ok(inhalt
                .lines()
                .map(|z| z.trim_end_matches('\r').to_string())
                .filter(|z| !z.is_empty())
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KanalListe for DateiKanalListe {
    fn enthaelt(&self, name: &str) -> VoiceResult<bool> {
        let _lesen = self.sperre.read();
        Ok(self.zeilen_lesen()?.iter().any(|z| z == name))
    }

    fn hinzufuegen(&self, name: &str) -> VoiceResult<()> {
        let _schreiben = self.sperre.write();
        if self.zeilen_lesen()?.iter().any(|z| z == name) {
            return Ok(());
        }
        let mut datei = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.pfad)?;
        writeln!(datei, "{name}")?;
        tracing::info!(kanal = name, pfad = %self.pfad.display(), "Kanal gesperrt");
        Ok(())
    }

    fn entfernen(&self, name: &str) -> VoiceResult<bool> {
        let _schreiben = self.sperre.write();
        let zeilen = self.zeilen_lesen()?;
        let rest: Vec<&String> = zeilen.iter().filter(|z| *z != name).collect();
        if rest.len() == zeilen.len() {
            return Ok(false);
        }
        let mut inhalt = String::new();
        for zeile in rest {
            inhalt.push_str(zeile);
            inhalt.push('\n');
        }
        std::fs::write(&self.pfad, inhalt)?;
        tracing::info!(kanal = name, pfad = %self.pfad.display(), "Kanal freigegeben");
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Normalisierung
// ---------------------------------------------------------------------------

fn ist_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F1E6..=0x1F1FF   // Regionalindikatoren
            | 0x1F300..=0x1F5FF // Symbole und Piktogramme
            | 0x1F600..=0x1F64F // Emoticons
            | 0x1F680..=0x1F6FF // Verkehr und Karten
            | 0x1F900..=0x1F9FF // Ergaenzende Symbole
            | 0x1FA70..=0x1FAFF
            | 0x2600..=0x27BF
            | 0xFE0F
            | 0x200D
    )
}

/// Entfernt Emoji und umgebende Leerzeichen
///
/// Ergibt sich ein leerer Name, wird `ersatz` verwendet.
pub fn kanalname_normalisieren(name: &str, ersatz: &str) -> String {
    let ohne: String = name.chars().filter(|c| !ist_emoji(*c)).collect();
    let ohne = ohne.trim();
    if ohne.is_empty() {
        ersatz.to_string()
    } else {
        ohne.to_string()
    }
}

// ---------------------------------------------------------------------------
// Zugangspruefer
// ---------------------------------------------------------------------------

/// Entscheidet ob ein Kanal betreten werden darf
pub struct Zugangspruefer {
    liste: Arc<dyn KanalListe>,
    gesperrter_kanal: Option<ChannelId>,
    ersatzname: String,
}

impl Zugangspruefer {
    pub fn neu(
        liste: Arc<dyn KanalListe>,
        gesperrter_kanal: Option<ChannelId>,
        ersatzname: impl Into<String>,
    ) -> Self {
        Self {
            liste,
            gesperrter_kanal,
            ersatzname: ersatzname.into(),
        }
    }

    /// Weder reservierter Kanal noch auf der Kanalliste
    pub fn ist_erlaubt(&self, kanal: &Kanal) -> bool {
        !self.ist_gesperrter_kanal(kanal.id) && !self.auf_liste(kanal)
    }

    /// Ist `id` der reservierte Kanal?
    pub fn ist_gesperrter_kanal(&self, id: ChannelId) -> bool {
        self.gesperrter_kanal == Some(id)
    }

    /// Steht der normalisierte Name auf der Kanalliste?
    pub fn auf_liste(&self, kanal: &Kanal) -> bool {
        let name = self.normalisieren(&kanal.name);
        match self.liste.enthaelt(&name) {
            Ok(enthalten) => enthalten,
            Err(e) => {
                tracing::warn!(
                    kanal = %name,
                    fehler = %e,
                    "Kanalliste nicht lesbar, Kanal wird zugelassen (degradiert)"
                );
                false
            }
        }
    }

    /// Sperrt bzw. entsperrt `kanalname`; `true` wenn danach gesperrt
    pub fn umschalten(&self, kanalname: &str) -> VoiceResult<bool> {
        let name = self.normalisieren(kanalname);
        if self.liste.entfernen(&name)? {
            Ok(false)
        } else {
            self.liste.hinzufuegen(&name)?;
            Ok(true)
        }
    }

    pub fn normalisieren(&self, name: &str) -> String {
        kanalname_normalisieren(name, &self.ersatzname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pruefer(liste: DateiKanalListe) -> Zugangspruefer {
        Zugangspruefer::neu(Arc::new(liste), Some(ChannelId(99)), STANDARD_ERSATZNAME)
    }

    #[test]
    fn emoji_werden_entfernt() {
        assert_eq!(kanalname_normalisieren("Ops 🚫", "x"), "Ops");
        assert_eq!(kanalname_normalisieren("🎮 Gaming 🎧", "x"), "Gaming");
        assert_eq!(kanalname_normalisieren("☕ Pause", "x"), "Pause");
        assert_eq!(kanalname_normalisieren("🔥🔥", "Ersatz"), "Ersatz");
        assert_eq!(kanalname_normalisieren("Café", "x"), "Café");
    }

    #[test]
    fn liste_hinzufuegen_und_entfernen() {
        let dir = tempfile::tempdir().unwrap();
        let liste = DateiKanalListe::neu(dir.path().join("kanaele.txt"));

        assert!(!liste.enthaelt("Ops").unwrap());
        liste.hinzufuegen("Ops").unwrap();
        liste.hinzufuegen("Ops").unwrap();
        liste.hinzufuegen("Lager").unwrap();
        assert!(liste.enthaelt("Ops").unwrap());
        assert!(!liste.enthaelt("ops").unwrap());

        let inhalt = std::fs::read_to_string(liste.pfad()).unwrap();
        assert_eq!(inhalt, "Ops\nLager\n");

        assert!(liste.entfernen("Ops").unwrap());
        assert!(!liste.entfernen("Ops").unwrap());
        assert!(!liste.enthaelt("Ops").unwrap());
        assert!(liste.enthaelt("Lager").unwrap());
    }

    #[test]
    fn gesperrter_name_mit_emoji() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("kanaele.txt");
        std::fs::write(&pfad, "Ops\r\n").unwrap();
        let z = pruefer(DateiKanalListe::neu(pfad));

        assert!(!z.ist_erlaubt(&Kanal::neu(1, "Ops 🚫", vec![])));
        assert!(z.auf_liste(&Kanal::neu(1, "Ops 🚫", vec![])));
        assert!(z.ist_erlaubt(&Kanal::neu(2, "General", vec![])));
    }

    #[test]
    fn reservierter_kanal_ist_nie_erlaubt() {
        let dir = tempfile::tempdir().unwrap();
        let z = pruefer(DateiKanalListe::neu(dir.path().join("leer.txt")));
        assert!(!z.ist_erlaubt(&Kanal::neu(99, "General", vec![])));
        assert!(z.ist_gesperrter_kanal(ChannelId(99)));
        assert!(!z.auf_liste(&Kanal::neu(99, "General", vec![])));
    }

    #[test]
    fn lesefehler_laesst_kanal_zu() {
        let dir = tempfile::tempdir().unwrap();
        // Ein Verzeichnis statt einer Datei
        let z = pruefer(DateiKanalListe::neu(dir.path()));
        assert!(z.ist_erlaubt(&Kanal::neu(1, "General", vec![])));
    }

    #[test]
    fn umschalten_wechselt_zustand() {
        let dir = tempfile::tempdir().unwrap();
        let z = pruefer(DateiKanalListe::neu(dir.path().join("kanaele.txt")));
        assert!(z.umschalten("Musik 🎵").unwrap());
        assert!(!z.ist_erlaubt(&Kanal::neu(5, "Musik", vec![])));
        assert!(!z.umschalten("Musik").unwrap());
        assert!(z.ist_erlaubt(&Kanal::neu(5, "Musik 🎵", vec![])));
    }
}
