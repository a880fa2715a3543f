//! Bot-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Bot ohne Konfigurationsdatei
//! lauffaehig ist (dann allerdings ohne Samples).

use std::path::PathBuf;
use std::time::Duration;

use grussbot_audio::SampleQuellen;
use grussbot_core::{ChannelId, MemberId};
use grussbot_voice::{SitzungsKonfig, Verzoegerungen};
use serde::{Deserialize, Serialize};

/// Vollstaendige Bot-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Identitaet und Berechtigungen
    pub bot: BotEinstellungen,
    /// Sample-Verzeichnisse und Sprachsynthese
    pub audio: AudioEinstellungen,
    /// Gesperrte Kanaele
    pub kanalliste: KanallisteEinstellungen,
    /// Entprellung und Leerlauf-Pruefung
    pub zeiten: ZeitEinstellungen,
    pub logging: LoggingEinstellungen,
    pub zufall: ZufallEinstellungen,
}

/// Identitaet und Berechtigungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotEinstellungen {
    /// Mitglieds-ID des Bots selbst
    pub bot_id: u64,
    /// Reservierter Kanal, der nie betreten wird
    pub gesperrter_kanal: Option<u64>,
    /// Mitglieder, die die Kanalliste verwalten duerfen
    pub admins: Vec<u64>,
    /// Ersatz fuer Kanalnamen, die nur aus Emoji bestehen
    pub ersatz_kanalname: String,
}

impl Default for BotEinstellungen {
    fn default() -> Self {
        Self {
            bot_id: 0,
            gesperrter_kanal: None,
            admins: vec![],
            ersatz_kanalname: "Sprachkanal".into(),
        }
    }
}

/// Sample-Verzeichnisse und Sprachsynthese
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    pub samples: SampleQuellen,
    /// URL-Vorlage des Sprachdienstes, `{text}` wird durch den
    /// URL-kodierten Text ersetzt (leer = keine Sprachausgabe)
    pub sprach_endpunkt: Option<String>,
    /// Timeout einer Sprachanfrage in Millisekunden
    pub sprach_timeout_ms: u64,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            samples: SampleQuellen {
                themen_schluesselwoerter: vec!["LOVEEEEEE".into()],
                ..SampleQuellen::default()
            },
            sprach_endpunkt: None,
            sprach_timeout_ms: 5000,
        }
    }
}

/// Gesperrte Kanaele
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KanallisteEinstellungen {
    /// Textdatei mit einem Kanalnamen pro Zeile
    pub datei: PathBuf,
}

impl Default for KanallisteEinstellungen {
    fn default() -> Self {
        Self {
            datei: PathBuf::from("excluded-voice-channels.txt"),
        }
    }
}

/// Entprellung und Leerlauf-Pruefung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeitEinstellungen {
    pub wiederverbinden_ms: u64,
    pub begruessung_ms: u64,
    pub abschied_ms: u64,
    /// Periode der Leerlauf-Pruefung in Sekunden
    pub leerlauf_intervall_s: u64,
}

impl Default for ZeitEinstellungen {
    fn default() -> Self {
        Self {
            wiederverbinden_ms: 100,
            begruessung_ms: 500,
            abschied_ms: 200,
            leerlauf_intervall_s: 6 * 60 * 60,
        }
    }
}

impl ZeitEinstellungen {
    pub fn verzoegerungen(&self) -> Verzoegerungen {
        Verzoegerungen {
            wiederverbinden: Duration::from_millis(self.wiederverbinden_ms),
            begruessung: Duration::from_millis(self.begruessung_ms),
            abschied: Duration::from_millis(self.abschied_ms),
            // Null wuerde tokio::time::interval panicken lassen
            leerlauf_intervall: Duration::from_secs(self.leerlauf_intervall_s.max(1)),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Zufallsquelle der Sample-Auswahl
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZufallEinstellungen {
    /// Fester Seed (leer = vom Betriebssystem)
    pub seed: Option<u64>,
}

impl BotConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Parameter fuer die Sitzungs-Verwaltung
    pub fn sitzungs_konfig(&self) -> SitzungsKonfig {
        SitzungsKonfig {
            bot_id: MemberId(self.bot.bot_id),
            zeiten: self.zeiten.verzoegerungen(),
            zufalls_seed: self.zufall.seed,
        }
    }

    pub fn gesperrter_kanal(&self) -> Option<ChannelId> {
        self.bot.gesperrter_kanal.map(ChannelId)
    }

    pub fn admins(&self) -> Vec<MemberId> {
        self.bot.admins.iter().copied().map(MemberId).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = BotConfig::default();
        assert_eq!(cfg.bot.ersatz_kanalname, "Sprachkanal");
        assert_eq!(cfg.kanalliste.datei, PathBuf::from("excluded-voice-channels.txt"));
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.audio.sprach_endpunkt.is_none());
        assert_eq!(cfg.zeiten.verzoegerungen(), Verzoegerungen::default());
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [bot]
            bot_id = 1247215648862502925
            gesperrter_kanal = 1247215648862502999
            admins = [7, 8]

            [audio]
            sprach_endpunkt = "http://localhost:5002/tts?text={text}"

            [audio.samples]
            willkommen = "samples/welcome"
            themen_schluesselwoerter = ["LOVE"]

            [zeiten]
            begruessung_ms = 750
        "#;
        let cfg: BotConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.bot.bot_id, 1247215648862502925);
        assert_eq!(cfg.gesperrter_kanal(), Some(ChannelId(1247215648862502999)));
        assert_eq!(cfg.admins(), vec![MemberId(7), MemberId(8)]);
        assert_eq!(
            cfg.audio.samples.willkommen,
            Some(PathBuf::from("samples/welcome"))
        );
        assert_eq!(cfg.audio.samples.themen_schluesselwoerter, vec!["LOVE"]);

        let zeiten = cfg.sitzungs_konfig().zeiten;
        assert_eq!(zeiten.begruessung, Duration::from_millis(750));
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(zeiten.abschied, Duration::from_millis(200));
        assert_eq!(cfg.bot.ersatz_kanalname, "Sprachkanal");
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("gibt-es-nicht.toml");
        let cfg = BotConfig::laden(pfad.to_str().unwrap()).unwrap();
        assert_eq!(cfg.bot.bot_id, 0);
    }

    #[test]
    fn kaputte_datei_ist_ein_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("config.toml");
        std::fs::write(&pfad, "[bot\nbot_id = ").unwrap();
        let fehler = BotConfig::laden(pfad.to_str().unwrap()).unwrap_err();
        assert!(fehler.to_string().contains("Konfigurationsfehler"));
    }

    #[test]
    fn leerlauf_intervall_null_wird_angehoben() {
        let zeiten = ZeitEinstellungen {
            leerlauf_intervall_s: 0,
            ..ZeitEinstellungen::default()
        };
        assert_eq!(zeiten.verzoegerungen().leerlauf_intervall, Duration::from_secs(1));
    }
}
