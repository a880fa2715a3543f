//! Uebergangs-Ereignisse des Gateways
//!
//! Ein [`Uebergang`] beschreibt genau eine Aenderung der Sprachkanal-
//! Zugehoerigkeit eines Mitglieds. Das Gateway liefert jedes Ereignis
//! hoechstens einmal und pro Sitzung in Ankunftsreihenfolge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Kanal, Mitglied, SessionId};

/// Ein Mitglied hat einen Sprachkanal betreten, gewechselt oder verlassen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Uebergang {
    pub sitzung: SessionId,
    pub mitglied: Mitglied,
    /// Betretener Kanal (Snapshot nach dem Uebergang)
    #[serde(default)]
    pub beigetreten: Option<Kanal>,
    /// Verlassener Kanal (Snapshot nach dem Uebergang)
    #[serde(default)]
    pub verlassen: Option<Kanal>,
    #[serde(default = "chrono::Utc::now")]
    pub zeitpunkt: DateTime<Utc>,
}

/// Klassifikation eines Uebergangs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UebergangsArt<'a> {
    /// Nur `beigetreten` gesetzt
    NurBeitritt { ziel: &'a Kanal },
    /// Nur `verlassen` gesetzt
    NurAustritt { quelle: &'a Kanal },
    /// Beide gesetzt, verschiedene Kanaele
    Wechsel { quelle: &'a Kanal, ziel: &'a Kanal },
}

impl Uebergang {
    /// Erstellt ein Ereignis mit aktuellem Zeitstempel
    pub fn neu(
        sitzung: SessionId,
        mitglied: Mitglied,
        beigetreten: Option<Kanal>,
        verlassen: Option<Kanal>,
    ) -> Self {
        Self {
            sitzung,
            mitglied,
            beigetreten,
            verlassen,
            zeitpunkt: Utc::now(),
        }
    }

    /// Klassifiziert das Ereignis.
    ///
    /// `None` wenn keine Seite gesetzt ist oder beide Seiten derselbe Kanal
    /// sind (z.B. reine Mute-Aenderungen).
    pub fn art(&self) -> Option<UebergangsArt<'_>> {
        match (self.verlassen.as_ref(), self.beigetreten.as_ref()) {
            (None, Some(ziel)) => Some(UebergangsArt::NurBeitritt { ziel }),
            (Some(quelle), None) => Some(UebergangsArt::NurAustritt { quelle }),
            (Some(quelle), Some(ziel)) if quelle.id != ziel.id => {
                Some(UebergangsArt::Wechsel { quelle, ziel })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kanal(id: u64) -> Kanal {
        Kanal::neu(id, format!("Kanal {id}"), vec![])
    }

    #[test]
    fn klassifikation() {
        let m = Mitglied::neu(1, "anna");
        let s = SessionId(1);

        let beitritt = Uebergang::neu(s, m.clone(), Some(kanal(1)), None);
        assert!(matches!(beitritt.art(), Some(UebergangsArt::NurBeitritt { .. })));

        let austritt = Uebergang::neu(s, m.clone(), None, Some(kanal(1)));
        assert!(matches!(austritt.art(), Some(UebergangsArt::NurAustritt { .. })));

        let wechsel = Uebergang::neu(s, m.clone(), Some(kanal(2)), Some(kanal(1)));
        match wechsel.art() {
            Some(UebergangsArt::Wechsel { quelle, ziel }) => {
                assert_eq!(quelle.id.inner(), 1);
                assert_eq!(ziel.id.inner(), 2);
            }
            andere => panic!("Wechsel erwartet, erhalten: {andere:?}"),
        }
    }

    #[test]
    fn gleicher_kanal_und_leeres_ereignis_werden_ignoriert() {
        let m = Mitglied::neu(1, "anna");
        let s = SessionId(1);
        assert!(Uebergang::neu(s, m.clone(), Some(kanal(1)), Some(kanal(1)))
            .art()
            .is_none());
        assert!(Uebergang::neu(s, m, None, None).art().is_none());
    }

    #[test]
    fn ereignis_aus_json_ohne_zeitstempel() {
        let json = r#"{
            "sitzung": 42,
            "mitglied": { "id": 5, "name": "anna" },
            "beigetreten": { "id": 100, "name": "General", "mitglieder": [] }
        }"#;
        let e: Uebergang = serde_json::from_str(json).unwrap();
        assert_eq!(e.sitzung, SessionId(42));
        assert!(!e.mitglied.ist_bot);
        assert!(e.verlassen.is_none());
        assert!(matches!(e.art(), Some(UebergangsArt::NurBeitritt { .. })));
    }
}
