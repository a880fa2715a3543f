//! Konsolen-Gateway – JSON-Zeilen auf stdin, Antworten auf stdout
//!
//! Jede Zeile ist ein Objekt mit dem Feld `art`:
//!
//! ```text
//! {"art":"uebergang","sitzung":1,"mitglied":{"id":5,"name":"anna"},"beigetreten":{"id":10,"name":"General","mitglieder":[...]}}
//! {"art":"befehl","sitzung":1,"mitglied":{"id":5,"name":"anna"},"kanal":{...},"name":"tts","argument":"ciao"}
//! ```
//!
//! Leere Zeilen und Zeilen mit `#` am Anfang werden ignoriert. Uebergaenge
//! gehen an den Worker ihrer Sitzung, Befehle werden sofort ausgefuehrt und
//! beantwortet.

use std::sync::Arc;

use grussbot_core::{GrussbotError, MemberId, Result, SessionId, Uebergang};
use grussbot_voice::SitzungsVerwaltung;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::befehle::{BefehlsAufruf, BefehlsRegister};

/// Eingehende Nachricht
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "art", rename_all = "snake_case")]
pub enum GatewayNachricht {
    Uebergang(Uebergang),
    Befehl(BefehlsAufruf),
}

/// Antwort auf einen Befehl
#[derive(Debug, Clone, Serialize)]
pub struct Antwort {
    pub sitzung: SessionId,
    pub mitglied: MemberId,
    pub text: String,
    pub fehler: bool,
}

/// Zaehler eines Gateway-Laufs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStatistik {
    pub uebergaenge: u64,
    pub befehle: u64,
    pub verworfen: u64,
}

/// Parst eine Zeile; `Ok(None)` fuer Leer- und Kommentarzeilen
pub fn nachricht_parsen(zeile: &str) -> Result<Option<GatewayNachricht>> {
    let zeile = zeile.trim();
    if zeile.is_empty() || zeile.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(zeile)
        .map(Some)
        .map_err(|e| GrussbotError::UngueltigeNachricht(e.to_string()))
}

pub struct Gateway {
    verwaltung: SitzungsVerwaltung,
    befehle: Arc<BefehlsRegister>,
}

impl Gateway {
    pub fn neu(verwaltung: SitzungsVerwaltung, befehle: Arc<BefehlsRegister>) -> Self {
        Self {
            verwaltung,
            befehle,
        }
    }

    /// Liest Zeilen bis EOF und schreibt Antworten als JSON-Zeilen
    pub async fn laufen<R, W>(&self, leser: R, mut schreiber: W) -> anyhow::Result<GatewayStatistik>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut statistik = GatewayStatistik::default();
        let mut zeilen = leser.lines();
        while let Some(zeile) = zeilen.next_line().await? {
            let nachricht = match nachricht_parsen(&zeile) {
                Ok(Some(n)) => n,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(fehler = %e, "Zeile verworfen");
                    statistik.verworfen += 1;
                    continue;
                }
            };
            match nachricht {
                GatewayNachricht::Uebergang(ereignis) => {
                    statistik.uebergaenge += 1;
                    let sitzung = ereignis.sitzung;
                    if let Err(e) = self.verwaltung.zustellen(ereignis) {
                        tracing::error!(sitzung = %sitzung, fehler = %e, "Zustellung fehlgeschlagen");
                    }
                }
                GatewayNachricht::Befehl(aufruf) => {
                    statistik.befehle += 1;
                    let antwort = self.befehl_beantworten(&aufruf);
                    let mut json = serde_json::to_string(&antwort)?;
                    json.push('\n');
                    schreiber.write_all(json.as_bytes()).await?;
                    schreiber.flush().await?;
                }
            }
        }
        tracing::info!(
            uebergaenge = statistik.uebergaenge,
            befehle = statistik.befehle,
            verworfen = statistik.verworfen,
            "Gateway-Eingabe beendet"
        );
        Ok(statistik)
    }

    /// Fuehrt einen Befehl aus; Fehler werden zur Antwort
    pub fn befehl_beantworten(&self, aufruf: &BefehlsAufruf) -> Antwort {
        let (text, fehler) = match self.befehle.ausfuehren(aufruf) {
            Ok(text) => (text, false),
            Err(e) => {
                if e.ist_benutzerfehler() {
                    tracing::info!(mitglied = %aufruf.mitglied.id, befehl = %aufruf.name, fehler = %e, "Befehl abgelehnt");
                } else {
                    tracing::error!(mitglied = %aufruf.mitglied.id, befehl = %aufruf.name, fehler = %e, "Befehl fehlgeschlagen");
                }
                (e.to_string(), true)
            }
        };
        Antwort {
            sitzung: aufruf.sitzung,
            mitglied: aufruf.mitglied.id,
            text,
            fehler,
        }
    }
}
