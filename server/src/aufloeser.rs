//! Audio-Aufloeser: Ogg/Opus-Samples und Sprachsynthese
//!
//! Samples liegen als `.opus`-Dateien (Ogg-Container) vor. Die Opus-Pakete
//! werden nur demultiplext, nicht dekodiert; der Transport bekommt sie
//! unveraendert als 20-ms-Frames. Sprachanfragen werden per HTTP beim
//! konfigurierten Dienst geholt, der ebenfalls Ogg/Opus liefern muss.

use std::fs::File;
use std::io::{Cursor, ErrorKind};
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use grussbot_audio::{AudioAufloeser, AudioError, AudioResult, FrameQuelle, QuellenArt, TrackAnfrage};
use symphonia::core::codecs::CODEC_TYPE_OPUS;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::runtime::Handle;

use crate::config::AudioEinstellungen;

/// Platzhalter fuer den Text in der Endpunkt-Vorlage
pub const TEXT_PLATZHALTER: &str = "{text}";

/// Sprachdienst per HTTP
struct SprachDienst {
    client: reqwest::Client,
    vorlage: String,
    laufzeit: Handle,
}

impl SprachDienst {
    fn holen(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let url = sprach_url(&self.vorlage, text);
        let client = self.client.clone();
        // Laeuft auf dem Dekoder-Thread, nicht auf einem Runtime-Worker
        self.laufzeit.block_on(async move {
            let antwort = client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("Anfrage an {url} fehlgeschlagen"))?
                .error_for_status()
                .context("Sprachdienst meldet Fehler")?;
            let daten = antwort.bytes().await.context("Antwort unvollstaendig")?;
            Ok(daten.to_vec())
        })
    }
}

/// Setzt den URL-kodierten Text in die Endpunkt-Vorlage ein
pub fn sprach_url(vorlage: &str, text: &str) -> String {
    let kodiert = urlencoding::encode(text);
    if vorlage.contains(TEXT_PLATZHALTER) {
        vorlage.replace(TEXT_PLATZHALTER, &kodiert)
    } else {
        format!("{}/{kodiert}", vorlage.trim_end_matches('/'))
    }
}

/// Loest Sample-Pfade und `speech://`-Kennungen in Opus-Paketquellen auf
pub struct OggOpusAufloeser {
    sprache: Option<SprachDienst>,
}

impl OggOpusAufloeser {
    /// Baut den Aufloeser; muss innerhalb der Tokio-Runtime aufgerufen werden
    /// wenn ein Sprachdienst konfiguriert ist.
    pub fn neu(einstellungen: &AudioEinstellungen) -> anyhow::Result<Self> {
        let sprache = match einstellungen
            .sprach_endpunkt
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        {
            Some(vorlage) => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_millis(einstellungen.sprach_timeout_ms))
                    .build()
                    .context("HTTP-Client fuer Sprachdienst")?;
                let laufzeit =
                    Handle::try_current().context("Sprachdienst braucht eine Tokio-Runtime")?;
                tracing::info!(endpunkt = vorlage, "Sprachdienst konfiguriert");
                Some(SprachDienst {
                    client,
                    vorlage: vorlage.to_string(),
                    laufzeit,
                })
            }
            None => {
                tracing::warn!("Kein Sprachdienst konfiguriert, Sprachausgabe entfaellt");
                None
            }
        };
        Ok(Self { sprache })
    }

    fn sample_oeffnen(&self, anfrage: &TrackAnfrage) -> AudioResult<Box<dyn FrameQuelle>> {
        let datei = File::open(anfrage.kennung()).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AudioError::QuelleNichtGefunden(anfrage.kennung().to_string()),
            _ => AudioError::Laden {
                kennung: anfrage.kennung().to_string(),
                grund: e.to_string(),
            },
        })?;
        Ok(Box::new(OpusPaketQuelle::oeffnen(
            Box::new(datei),
            anfrage.kennung(),
        )?))
    }

    fn sprache_holen(&self, anfrage: &TrackAnfrage) -> AudioResult<Box<dyn FrameQuelle>> {
        let laden_fehler = |grund: String| AudioError::Laden {
            kennung: anfrage.kennung().to_string(),
            grund,
        };
        let dienst = self
            .sprache
            .as_ref()
            .ok_or_else(|| laden_fehler("kein Sprachdienst konfiguriert".into()))?;
        let text = anfrage
            .sprachtext()
            .ok_or_else(|| laden_fehler("Text nicht dekodierbar".into()))?;
        let daten = dienst
            .holen(&text)
            .map_err(|e| laden_fehler(format!("{e:#}")))?;
        tracing::debug!(text = %text, bytes = daten.len(), "Sprachausgabe geladen");
        Ok(Box::new(OpusPaketQuelle::oeffnen(
            Box::new(Cursor::new(daten)),
            anfrage.kennung(),
        )?))
    }
}

impl AudioAufloeser for OggOpusAufloeser {
    fn aufloesen(&self, anfrage: &TrackAnfrage) -> AudioResult<Box<dyn FrameQuelle>> {
        match anfrage.art() {
            QuellenArt::Sample => self.sample_oeffnen(anfrage),
            QuellenArt::Sprache => self.sprache_holen(anfrage),
        }
    }
}

// ---------------------------------------------------------------------------
// Demux
// ---------------------------------------------------------------------------

/// Liest die Opus-Pakete einer Ogg-Quelle lazy, ein Paket pro Frame
pub struct OpusPaketQuelle {
    format: Box<dyn FormatReader>,
    spur: u32,
    kennung: String,
}

impl OpusPaketQuelle {
    pub fn oeffnen(quelle: Box<dyn MediaSource>, kennung: &str) -> AudioResult<Self> {
        let mss = MediaSourceStream::new(quelle, Default::default());
        let mut hint = Hint::new();
        hint.with_extension("ogg");

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::Demux(format!("{kennung}: {e}")))?;
        let format = probed.format;

        let spur = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec == CODEC_TYPE_OPUS)
            .map(|t| t.id)
            .ok_or_else(|| AudioError::Demux(format!("{kennung}: keine Opus-Spur")))?;

        Ok(Self {
            format,
            spur,
            kennung: kennung.to_string(),
        })
    }
}

impl FrameQuelle for OpusPaketQuelle {
    fn naechster_frame(&mut self) -> AudioResult<Option<Bytes>> {
        loop {
            match self.format.next_packet() {
                Ok(paket) if paket.track_id() == self.spur => {
                    return Ok(Some(Bytes::copy_from_slice(paket.buf())));
                }
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(e) => return Err(AudioError::Demux(format!("{}: {e}", self.kennung))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ohne_sprache() -> OggOpusAufloeser {
        OggOpusAufloeser::neu(&AudioEinstellungen::default()).unwrap()
    }

    #[test]
    fn url_aus_vorlage() {
        assert_eq!(
            sprach_url("http://tts.local/api?text={text}&lang=it", "ciao Anna"),
            "http://tts.local/api?text=ciao%20Anna&lang=it"
        );
        assert_eq!(
            sprach_url("http://tts.local/say/", "a&b"),
            "http://tts.local/say/a%26b"
        );
    }

    #[test]
    fn fehlendes_sample() {
        let dir = tempfile::tempdir().unwrap();
        let anfrage = TrackAnfrage::sample(dir.path().join("weg.opus"));
        let fehler = ohne_sprache().aufloesen(&anfrage).err().unwrap();
        assert!(matches!(fehler, AudioError::QuelleNichtGefunden(_)));
    }

    #[test]
    fn keine_ogg_datei_ist_ein_demux_fehler() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("kaputt.opus");
        std::fs::write(&pfad, b"das ist kein ogg").unwrap();
        let fehler = ohne_sprache()
            .aufloesen(&TrackAnfrage::sample(&pfad))
            .err()
            .unwrap();
        assert!(matches!(fehler, AudioError::Demux(_)));
    }

    #[test]
    fn sprache_ohne_dienst_schlaegt_fehl() {
        let fehler = ohne_sprache()
            .aufloesen(&TrackAnfrage::sprache("hallo"))
            .err()
            .unwrap();
        match fehler {
            AudioError::Laden { kennung, grund } => {
                assert_eq!(kennung, "speech://hallo");
                assert!(grund.contains("kein Sprachdienst"));
            }
            andere => panic!("Ladefehler erwartet, erhalten: {andere:?}"),
        }
    }

    #[tokio::test]
    async fn dienst_wird_innerhalb_der_runtime_angelegt() {
        let einstellungen = AudioEinstellungen {
            sprach_endpunkt: Some("http://127.0.0.1:9/tts?text={text}".into()),
            ..AudioEinstellungen::default()
        };
        let aufloeser = OggOpusAufloeser::neu(&einstellungen).unwrap();
        assert!(aufloeser.sprache.is_some());
    }
}
