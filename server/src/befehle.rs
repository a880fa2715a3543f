//! Befehle – geschlossenes Register, beim Start einmal aufgebaut
//!
//! | Befehl            | Wirkung                                                  |
//! |-------------------|----------------------------------------------------------|
//! | `hilfe`           | Listet alle Befehle mit Beschreibung                     |
//! | `tts <text>`      | Tritt bei Bedarf dem Kanal des Aufrufers bei, spricht    |
//! | `abspielen [name]`| Spielt ein Sample sofort; ohne Namen: Liste der Samples  |
//! | `kanalverwaltung` | Nur Admins: Kanal auf der Kanalliste sperren/entsperren  |

use std::collections::HashSet;
use std::sync::Arc;

use grussbot_audio::SamplePools;
use grussbot_core::{GrussbotError, Kanal, MemberId, Mitglied, Result, SessionId};
use grussbot_voice::{KanalBeobachter, SitzungsVerwaltung, VoiceError};
use serde::Deserialize;

/// Name und Beschreibung eines Befehls (fuer `hilfe`)
#[derive(Debug, Clone, Copy)]
pub struct BefehlsInfo {
    pub name: &'static str,
    pub beschreibung: &'static str,
}

/// Alle Befehle in Anzeige-Reihenfolge
pub const BEFEHLE: &[BefehlsInfo] = &[
    BefehlsInfo {
        name: "hilfe",
        beschreibung: "Zeigt diese Liste",
    },
    BefehlsInfo {
        name: "tts",
        beschreibung: "Liest einen Text im Sprachkanal vor",
    },
    BefehlsInfo {
        name: "abspielen",
        beschreibung: "Spielt ein Sample sofort ab (ohne Namen: verfuegbare Samples)",
    },
    BefehlsInfo {
        name: "kanalverwaltung",
        beschreibung: "Sperrt oder entsperrt einen Sprachkanal (nur Admins)",
    },
];

/// Aufgeloester Befehl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Befehl {
    Hilfe,
    Tts { text: String },
    /// `None` listet die verfuegbaren Samples
    Abspielen { sample: Option<String> },
    Kanalverwaltung { kanal: String },
}

impl Befehl {
    /// Loest Name und Argument in einen Befehl auf
    pub fn parsen(name: &str, argument: Option<&str>) -> Result<Self> {
        let argument = argument.map(str::trim).filter(|a| !a.is_empty());
        let pflicht = |arg: &str| -> Result<String> {
            argument.map(str::to_string).ok_or_else(|| GrussbotError::FehlendesArgument {
                befehl: name.to_string(),
                argument: arg.to_string(),
            })
        };
        match name.trim().to_lowercase().as_str() {
            "hilfe" | "help" => Ok(Self::Hilfe),
            "tts" => Ok(Self::Tts {
                text: pflicht("text")?,
            }),
            "abspielen" | "play" => Ok(Self::Abspielen {
                sample: argument.map(str::to_string),
            }),
            "kanalverwaltung" => Ok(Self::Kanalverwaltung {
                kanal: pflicht("kanal")?,
            }),
            andere => Err(GrussbotError::UnbekannterBefehl(andere.to_string())),
        }
    }
}

/// Befehlsaufruf wie ihn das Gateway liefert
#[derive(Debug, Clone, Deserialize)]
pub struct BefehlsAufruf {
    pub sitzung: SessionId,
    pub mitglied: Mitglied,
    /// Sprachkanal des Aufrufers
    #[serde(default)]
    pub kanal: Option<Kanal>,
    pub name: String,
    #[serde(default)]
    pub argument: Option<String>,
}

/// Fuehrt Befehle gegen die Sitzungs-Verwaltung aus
pub struct BefehlsRegister {
    verwaltung: SitzungsVerwaltung,
    samples: Arc<SamplePools>,
    admins: HashSet<MemberId>,
}

impl BefehlsRegister {
    pub fn neu(
        verwaltung: SitzungsVerwaltung,
        samples: Arc<SamplePools>,
        admins: impl IntoIterator<Item = MemberId>,
    ) -> Self {
        let admins: HashSet<MemberId> = admins.into_iter().collect();
        tracing::info!(
            befehle = BEFEHLE.len(),
            admins = admins.len(),
            "Befehlsregister aufgebaut"
        );
        Self {
            verwaltung,
            samples,
            admins,
        }
    }

    /// Fuehrt einen Aufruf aus und liefert den Antworttext
    pub fn ausfuehren(&self, aufruf: &BefehlsAufruf) -> Result<String> {
        let befehl = Befehl::parsen(&aufruf.name, aufruf.argument.as_deref())?;
        tracing::debug!(
            sitzung = %aufruf.sitzung,
            mitglied = %aufruf.mitglied.id,
            befehl = ?befehl,
            "Befehl empfangen"
        );
        match befehl {
            Befehl::Hilfe => Ok(hilfe_text()),
            Befehl::Tts { text } => self.tts(aufruf, &text),
            Befehl::Abspielen { sample: None } => Ok(self.sample_liste()),
            Befehl::Abspielen { sample: Some(name) } => self.abspielen(aufruf, &name),
            Befehl::Kanalverwaltung { kanal } => self.kanalverwaltung(aufruf, &kanal),
        }
    }

    pub fn ist_admin(&self, id: MemberId) -> bool {
        self.admins.contains(&id)
    }

    fn tts(&self, aufruf: &BefehlsAufruf, text: &str) -> Result<String> {
        let beobachter = self.bereit_machen(aufruf)?;
        beobachter.sprechen(text);
        Ok(format!("Ich sage: {text}"))
    }

    fn abspielen(&self, aufruf: &BefehlsAufruf, name: &str) -> Result<String> {
        let track = self
            .samples
            .abspiel_sample(name)
            .ok_or_else(|| GrussbotError::SampleNichtGefunden(name.to_string()))?;
        let anzeige = track.anzeigename();
        let beobachter = self.bereit_machen(aufruf)?;
        beobachter.sofort_abspielen(track);
        Ok(format!("Spiele {anzeige}"))
    }

    fn kanalverwaltung(&self, aufruf: &BefehlsAufruf, kanal: &str) -> Result<String> {
        if !self.ist_admin(aufruf.mitglied.id) {
            tracing::warn!(
                mitglied = %aufruf.mitglied.id,
                kanal = kanal,
                "Kanalverwaltung ohne Berechtigung"
            );
            return Err(GrussbotError::ZugriffVerweigert(
                "Kanalverwaltung ist Admins vorbehalten".into(),
            ));
        }
        let beobachter = self.verwaltung.sitzung(aufruf.sitzung).map_err(voice_fehler)?;
        let gesperrt = beobachter.kanalliste_umschalten(kanal).map_err(voice_fehler)?;
        Ok(if gesperrt {
            format!("Kanal {kanal} ist jetzt gesperrt")
        } else {
            format!("Kanal {kanal} ist wieder freigegeben")
        })
    }

    fn sample_liste(&self) -> String {
        let namen = self.samples.abspiel_namen();
        if namen.is_empty() {
            "Keine Samples verfuegbar".into()
        } else {
            format!("Verfuegbare Samples: {}", namen.join(", "))
        }
    }

    /// Sitzung des Aufrufers; verbindet mit seinem Kanal, falls noch getrennt
    fn bereit_machen(&self, aufruf: &BefehlsAufruf) -> Result<KanalBeobachter> {
        let beobachter = self.verwaltung.sitzung(aufruf.sitzung).map_err(voice_fehler)?;
        if !beobachter.verbindung().ist_verbunden() {
            let kanal = aufruf.kanal.as_ref().ok_or(GrussbotError::KeinSprachkanal)?;
            beobachter.beitreten(kanal).map_err(voice_fehler)?;
        }
        Ok(beobachter)
    }
}

fn hilfe_text() -> String {
    let mut text = String::from("Befehle:");
    for info in BEFEHLE {
        text.push_str(&format!("\n  {} - {}", info.name, info.beschreibung));
    }
    text
}

fn voice_fehler(e: VoiceError) -> GrussbotError {
    match e {
        VoiceError::KanalNichtErlaubt(name) => GrussbotError::KanalGesperrt(name),
        VoiceError::Audio(e) => GrussbotError::Audio(e.to_string()),
        VoiceError::Io(e) => GrussbotError::Io(e),
        andere => GrussbotError::Verbindung(andere.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsen_der_befehle() {
        assert_eq!(Befehl::parsen("hilfe", None).unwrap(), Befehl::Hilfe);
        assert_eq!(Befehl::parsen(" HELP ", Some("egal")).unwrap(), Befehl::Hilfe);
        assert_eq!(
            Befehl::parsen("tts", Some("  hallo welt ")).unwrap(),
            Befehl::Tts {
                text: "hallo welt".into()
            }
        );
        assert_eq!(
            Befehl::parsen("abspielen", None).unwrap(),
            Befehl::Abspielen { sample: None }
        );
        assert_eq!(
            Befehl::parsen("play", Some("tromba")).unwrap(),
            Befehl::Abspielen {
                sample: Some("tromba".into())
            }
        );
    }

    #[test]
    fn fehlende_argumente_und_unbekannte_befehle() {
        let e = Befehl::parsen("tts", Some("   ")).unwrap_err();
        assert!(matches!(e, GrussbotError::FehlendesArgument { .. }));
        assert!(e.ist_benutzerfehler());

        let e = Befehl::parsen("kanalverwaltung", None).unwrap_err();
        assert!(matches!(e, GrussbotError::FehlendesArgument { .. }));

        let e = Befehl::parsen("tanzen", None).unwrap_err();
        assert!(matches!(e, GrussbotError::UnbekannterBefehl(ref n) if n == "tanzen"));
    }

    #[test]
    fn hilfe_listet_alle_befehle_in_reihenfolge() {
        let text = hilfe_text();
        let positionen: Vec<usize> = BEFEHLE
            .iter()
            .map(|b| text.find(b.name).unwrap())
            .collect();
        assert!(positionen.windows(2).all(|p| p[0] < p[1]));
        assert!(text.contains("nur Admins"));
    }

    #[test]
    fn voice_fehler_abbildung() {
        let e = voice_fehler(VoiceError::KanalNichtErlaubt("Ops".into()));
        assert!(matches!(e, GrussbotError::KanalGesperrt(ref n) if n == "Ops"));
        let e = voice_fehler(VoiceError::Transport("weg".into()));
        assert!(matches!(e, GrussbotError::Verbindung(_)));
    }
}
