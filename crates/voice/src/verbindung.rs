//! Verbindung – Sprachverbindung einer Sitzung
//!
//! Oeffnet und schliesst die Verbindung ueber den [`SprachTransport`],
//! merkt sich den aktuellen Kanal und bindet die Wiedergabe als
//! Frame-Lieferant. Jede Zustandsaenderung erhoeht die Epoche; geplante
//! Aktionen vergleichen sie vor der Ausfuehrung.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use grussbot_audio::FrameLieferant;
use grussbot_core::{ChannelId, Kanal, SessionId};
use parking_lot::Mutex;

use crate::error::VoiceResult;
use crate::planer::Epochenquelle;

/// Netzwerkseite einer Sprachverbindung
pub trait SprachTransport: Send + Sync {
    /// Verbindet die Sitzung mit `kanal` (wechselt ggf. den Kanal)
    fn verbinden(&self, sitzung: SessionId, kanal: &Kanal) -> VoiceResult<()>;

    fn trennen(&self, sitzung: SessionId);

    /// Bindet den Frame-Lieferanten (`None` loest die Bindung)
    fn sender_binden(&self, sitzung: SessionId, lieferant: Option<Arc<dyn FrameLieferant>>);
}

/// Momentaufnahme des Verbindungszustands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerbindungsZustand {
    pub verbunden: bool,
    pub kanal: Option<ChannelId>,
    pub kanalname: Option<String>,
    pub epoche: u64,
}

/// Sprachverbindung einer Sitzung
pub struct Verbindung {
    sitzung: SessionId,
    transport: Arc<dyn SprachTransport>,
    lieferant: Arc<dyn FrameLieferant>,
    zustand: Mutex<VerbindungsZustand>,
    /// Spiegel von `zustand.epoche` fuer lockfreies Lesen
    epoche: AtomicU64,
}

impl Verbindung {
    pub fn neu(
        sitzung: SessionId,
        transport: Arc<dyn SprachTransport>,
        lieferant: Arc<dyn FrameLieferant>,
    ) -> Self {
        Self {
            sitzung,
            transport,
            lieferant,
            zustand: Mutex::new(VerbindungsZustand::default()),
            epoche: AtomicU64::new(0),
        }
    }

    /// Verbindet mit `kanal` und bindet den Sender
    ///
    /// No-op wenn bereits mit diesem Kanal verbunden. Bei einem
    /// Transportfehler bleibt die Sitzung sauber getrennt.
    pub fn verbinden(&self, kanal: &Kanal) -> VoiceResult<()> {
        let mut z = self.zustand.lock();
        if z.verbunden && z.kanal == Some(kanal.id) {
            tracing::trace!(sitzung = %self.sitzung, kanal = %kanal.id, "Bereits verbunden");
            return Ok(());
        }

        self.epoche_erhoehen(&mut z);

        match self.transport.verbinden(self.sitzung, kanal) {
            Ok(()) => {
                self.transport
                    .sender_binden(self.sitzung, Some(Arc::clone(&self.lieferant)));
                z.verbunden = true;
                z.kanal = Some(kanal.id);
                z.kanalname = Some(kanal.name.clone());
                tracing::info!(
                    sitzung = %self.sitzung,
                    kanal = %kanal.id,
                    name = %kanal.name,
                    epoche = z.epoche,
                    "Sprachverbindung geoeffnet"
                );
                Ok(())
            }
            Err(e) => {
                self.transport.sender_binden(self.sitzung, None);
                if z.verbunden {
                    self.transport.trennen(self.sitzung);
                }
                z.verbunden = false;
                z.kanal = None;
                z.kanalname = None;
                tracing::warn!(
                    sitzung = %self.sitzung,
                    kanal = %kanal.id,
                    fehler = %e,
                    "Verbindung fehlgeschlagen"
                );
                Err(e)
            }
        }
    }

    /// Trennt die Verbindung; der Sender wird immer geloest
    pub fn trennen(&self) {
        let mut z = self.zustand.lock();
        self.epoche_erhoehen(&mut z);
        self.transport.sender_binden(self.sitzung, None);
        if z.verbunden {
            self.transport.trennen(self.sitzung);
            tracing::info!(
                sitzung = %self.sitzung,
                kanal = ?z.kanal,
                epoche = z.epoche,
                "Sprachverbindung geschlossen"
            );
        }
        z.verbunden = false;
        z.kanal = None;
        z.kanalname = None;
    }

    pub fn ist_verbunden(&self) -> bool {
        self.zustand.lock().verbunden
    }

    pub fn aktueller_kanal(&self) -> Option<ChannelId> {
        self.zustand.lock().kanal
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        self.zustand.lock().clone()
    }

    pub fn sitzung(&self) -> SessionId {
        self.sitzung
    }

    fn epoche_erhoehen(&self, z: &mut VerbindungsZustand) {
        z.epoche += 1;
        self.epoche.store(z.epoche, Ordering::Release);
    }
}

impl Epochenquelle for Verbindung {
    fn epoche(&self) -> u64 {
        self.epoche.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoiceError;
    use bytes::Bytes;

    #[derive(Default)]
    struct Protokoll {
        verbinden: Mutex<Vec<ChannelId>>,
        trennen: Mutex<usize>,
        gebunden: Mutex<Option<bool>>,
        fehler: Mutex<bool>,
    }

    impl SprachTransport for Protokoll {
        fn verbinden(&self, _sitzung: SessionId, kanal: &Kanal) -> VoiceResult<()> {
            if *self.fehler.lock() {
                return Err(VoiceError::Transport("abgelehnt".into()));
            }
            self.verbinden.lock().push(kanal.id);
            Ok(())
        }

        fn trennen(&self, _sitzung: SessionId) {
            *self.trennen.lock() += 1;
        }

        fn sender_binden(&self, _sitzung: SessionId, lieferant: Option<Arc<dyn FrameLieferant>>) {
            *self.gebunden.lock() = Some(lieferant.is_some());
        }
    }

    struct Stille;

    impl FrameLieferant for Stille {
        fn frame_holen(&self) -> Option<Bytes> {
            None
        }
    }

    fn verbindung() -> (Arc<Protokoll>, Verbindung) {
        let transport = Arc::new(Protokoll::default());
        let v = Verbindung::neu(SessionId(1), transport.clone(), Arc::new(Stille));
        (transport, v)
    }

    #[test]
    fn verbinden_bindet_sender_und_erhoeht_epoche() {
        let (t, v) = verbindung();
        let general = Kanal::neu(10, "General", vec![]);

        v.verbinden(&general).unwrap();
        assert!(v.ist_verbunden());
        assert_eq!(v.aktueller_kanal(), Some(ChannelId(10)));
        assert_eq!(v.epoche(), 1);
        assert_eq!(*t.gebunden.lock(), Some(true));

        // Gleicher Kanal: keine Aenderung
        v.verbinden(&general).unwrap();
        assert_eq!(v.epoche(), 1);
        assert_eq!(t.verbinden.lock().len(), 1);
    }

    #[test]
    fn trennen_loest_sender_immer() {
        let (t, v) = verbindung();
        v.trennen();
        assert_eq!(*t.gebunden.lock(), Some(false));
        assert_eq!(*t.trennen.lock(), 0);
        assert_eq!(v.epoche(), 1);

        v.verbinden(&Kanal::neu(10, "General", vec![])).unwrap();
        v.trennen();
        assert!(!v.ist_verbunden());
        assert!(v.aktueller_kanal().is_none());
        assert_eq!(*t.trennen.lock(), 1);
        assert_eq!(v.epoche(), 3);
    }

    #[test]
    fn kanalwechsel_waehrend_verbunden() {
        let (t, v) = verbindung();
        v.verbinden(&Kanal::neu(10, "General", vec![])).unwrap();
        v.verbinden(&Kanal::neu(11, "Musik", vec![])).unwrap();
        assert_eq!(v.aktueller_kanal(), Some(ChannelId(11)));
        assert_eq!(*t.verbinden.lock(), vec![ChannelId(10), ChannelId(11)]);
    }

    #[test]
    fn transportfehler_hinterlaesst_getrennten_zustand() {
        let (t, v) = verbindung();
        *t.fehler.lock() = true;
        assert!(v.verbinden(&Kanal::neu(10, "General", vec![])).is_err());
        assert!(!v.ist_verbunden());
        assert_eq!(*t.gebunden.lock(), Some(false));
        assert_eq!(v.zustand().kanalname, None);
    }
}
