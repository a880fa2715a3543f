//! Protokollierender Sprach-Transport
//!
//! Stellt keine echte Netzwerkverbindung her. Jede gebundene Sitzung bekommt
//! einen 20-ms-Takt, dessen Senke die Frames zaehlt und protokolliert. Ein
//! Plattform-Adapter ersetzt diesen Typ durch einen eigenen
//! [`SprachTransport`].

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use grussbot_audio::FrameLieferant;
use grussbot_core::{ChannelId, Kanal, SessionId};
use grussbot_voice::{frame_takt_starten, FrameSenke, SprachTransport, TaktHandle, VoiceResult};

/// Alle wie viele Frames der Takt Fortschritt meldet (~5 s)
const MELDE_INTERVALL: u64 = 250;

/// Zaehlt gesendete Frames einer Sitzung
struct ProtokollSenke {
    sitzung: SessionId,
    frames: u64,
    bytes: u64,
    stille: u64,
}

impl FrameSenke for ProtokollSenke {
    fn senden(&mut self, frame: Bytes) {
        self.frames += 1;
        self.bytes += frame.len() as u64;
        if self.frames % MELDE_INTERVALL == 0 {
            tracing::debug!(
                sitzung = %self.sitzung,
                frames = self.frames,
                bytes = self.bytes,
                "Frames gesendet"
            );
        }
    }

    fn stille(&mut self) {
        self.stille += 1;
    }
}

impl Drop for ProtokollSenke {
    fn drop(&mut self) {
        tracing::debug!(
            sitzung = %self.sitzung,
            frames = self.frames,
            bytes = self.bytes,
            stille_ticks = self.stille,
            "Takt beendet"
        );
    }
}

/// Transport ohne Netzwerk, nur Protokoll
#[derive(Default)]
pub struct ProtokollTransport {
    kanaele: DashMap<SessionId, ChannelId>,
    takte: DashMap<SessionId, TaktHandle>,
}

impl ProtokollTransport {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Kanal, mit dem `sitzung` gerade verbunden ist
    pub fn kanal(&self, sitzung: SessionId) -> Option<ChannelId> {
        self.kanaele.get(&sitzung).map(|k| *k)
    }

    pub fn hat_takt(&self, sitzung: SessionId) -> bool {
        self.takte.contains_key(&sitzung)
    }
}

impl SprachTransport for ProtokollTransport {
    fn verbinden(&self, sitzung: SessionId, kanal: &Kanal) -> VoiceResult<()> {
        tracing::info!(sitzung = %sitzung, kanal = %kanal.id, name = %kanal.name, "Verbinde");
        self.kanaele.insert(sitzung, kanal.id);
        Ok(())
    }

    fn trennen(&self, sitzung: SessionId) {
        if let Some((_, kanal)) = self.kanaele.remove(&sitzung) {
            tracing::info!(sitzung = %sitzung, kanal = %kanal, "Getrennt");
        }
    }

    fn sender_binden(&self, sitzung: SessionId, lieferant: Option<Arc<dyn FrameLieferant>>) {
        match lieferant {
            Some(lieferant) => {
                let senke = ProtokollSenke {
                    sitzung,
                    frames: 0,
                    bytes: 0,
                    stille: 0,
                };
                // Ein vorhandener Takt endet beim Drop des alten Handles
                self.takte
                    .insert(sitzung, frame_takt_starten(lieferant, senke));
            }
            None => {
                self.takte.remove(&sitzung);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Feste(Mutex<u32>);

    impl FrameLieferant for Feste {
        fn frame_holen(&self) -> Option<Bytes> {
            let mut rest = self.0.lock();
            if *rest == 0 {
                return None;
            }
            *rest -= 1;
            Some(Bytes::from_static(b"opus"))
        }
    }

    #[tokio::test]
    async fn verbinden_binden_trennen() {
        let transport = ProtokollTransport::neu();
        let s = SessionId(1);
        let kanal = Kanal::neu(10, "General", vec![]);

        transport.verbinden(s, &kanal).unwrap();
        assert_eq!(transport.kanal(s), Some(ChannelId(10)));

        transport.sender_binden(s, Some(Arc::new(Feste(Mutex::new(3)))));
        assert!(transport.hat_takt(s));

        transport.sender_binden(s, None);
        assert!(!transport.hat_takt(s));

        transport.trennen(s);
        assert_eq!(transport.kanal(s), None);
        // Doppeltes Trennen ist harmlos
        transport.trennen(s);
    }
}
