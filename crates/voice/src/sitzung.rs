//! Sitzungs-Verwaltung – ein Zustandsautomat pro Guild/Raum
//!
//! Sitzungen werden beim ersten Ereignis angelegt. Jede Sitzung hat einen
//! eigenen Worker, der ihre Ereignisse in Ankunftsreihenfolge verarbeitet;
//! verschiedene Sitzungen laufen unabhaengig voneinander.

use std::sync::Arc;

use dashmap::DashMap;
use grussbot_audio::{AudioAufloeser, SamplePools, Wiedergabe};
use grussbot_core::{MemberId, SessionId, Uebergang};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::beobachter::{BeobachterKonfig, Entscheidung, KanalBeobachter};
use crate::error::{VoiceError, VoiceResult};
use crate::planer::{intervall_starten, Verzoegerungen};
use crate::verbindung::{SprachTransport, Verbindung};
use crate::zugang::Zugangspruefer;

/// Gemeinsame Parameter aller Sitzungen
#[derive(Debug, Clone, Copy)]
pub struct SitzungsKonfig {
    pub bot_id: MemberId,
    pub zeiten: Verzoegerungen,
    /// Fester Seed fuer reproduzierbare Sample-Auswahl
    pub zufalls_seed: Option<u64>,
}

struct Sitzung {
    beobachter: KanalBeobachter,
    ereignis_tx: mpsc::UnboundedSender<Uebergang>,
    worker: JoinHandle<()>,
}

struct VerwaltungInner {
    sitzungen: DashMap<SessionId, Sitzung>,
    transport: Arc<dyn SprachTransport>,
    aufloeser: Arc<dyn AudioAufloeser>,
    zugang: Arc<Zugangspruefer>,
    samples: Arc<SamplePools>,
    konfig: SitzungsKonfig,
}

/// Registry aller Sitzungen
#[derive(Clone)]
pub struct SitzungsVerwaltung {
    inner: Arc<VerwaltungInner>,
}

impl SitzungsVerwaltung {
    pub fn neu(
        transport: Arc<dyn SprachTransport>,
        aufloeser: Arc<dyn AudioAufloeser>,
        zugang: Arc<Zugangspruefer>,
        samples: Arc<SamplePools>,
        konfig: SitzungsKonfig,
    ) -> Self {
        Self {
            inner: Arc::new(VerwaltungInner {
                sitzungen: DashMap::new(),
                transport,
                aufloeser,
                zugang,
                samples,
                konfig,
            }),
        }
    }

    /// Beobachter der Sitzung `id`, bei Bedarf neu angelegt
    pub fn sitzung(&self, id: SessionId) -> VoiceResult<KanalBeobachter> {
        self.mit_sitzung(id, |s| s.beobachter.clone())
    }

    /// Stellt ein Ereignis dem Worker seiner Sitzung zu
    pub fn zustellen(&self, ereignis: Uebergang) -> VoiceResult<()> {
        let id = ereignis.sitzung;
        let tx = self.mit_sitzung(id, |s| s.ereignis_tx.clone())?;
        tx.send(ereignis)
            .map_err(|_| VoiceError::SitzungNichtGefunden(id))
    }

    /// Verarbeitet ein Ereignis direkt auf dem aufrufenden Task
    pub fn verarbeiten(&self, ereignis: &Uebergang) -> VoiceResult<Entscheidung> {
        Ok(self.sitzung(ereignis.sitzung)?.verarbeiten(ereignis))
    }

    /// Trennt alle Sitzungen, deren Bot allein im Kanal ist
    pub fn leerlauf_pruefen(&self) -> usize {
        let beobachter: Vec<KanalBeobachter> = self
            .inner
            .sitzungen
            .iter()
            .map(|s| s.beobachter.clone())
            .collect();
        beobachter.iter().filter(|b| b.leerlauf_pruefen()).count()
    }

    /// Startet die periodische Leerlauf-Pruefung (erster Lauf sofort)
    pub fn leerlauf_pruefung_starten(&self) -> JoinHandle<()> {
        let verwaltung = self.clone();
        let periode = self.inner.konfig.zeiten.leerlauf_intervall;
        tracing::info!(periode_s = periode.as_secs(), "Leerlauf-Pruefung gestartet");
        intervall_starten(periode, move || {
            let verwaltung = verwaltung.clone();
            async move {
                let getrennt = verwaltung.leerlauf_pruefen();
                if getrennt > 0 {
                    tracing::info!(getrennt, "Leerlauf-Pruefung abgeschlossen");
                } else {
                    tracing::debug!("Leerlauf-Pruefung: nichts zu tun");
                }
            }
        })
    }

    /// Beendet eine Sitzung (trennt und verwirft ihren Zustand)
    pub fn entfernen(&self, id: SessionId) -> bool {
        match self.inner.sitzungen.remove(&id) {
            Some((_, sitzung)) => {
                sitzung.beobachter.beenden();
                sitzung.worker.abort();
                tracing::info!(sitzung = %id, "Sitzung entfernt");
                true
            }
            None => false,
        }
    }

    /// Beendet alle Sitzungen
    pub fn alle_beenden(&self) {
        let ids: Vec<SessionId> = self.inner.sitzungen.iter().map(|s| *s.key()).collect();
        for id in ids {
            self.entfernen(id);
        }
    }

    pub fn anzahl(&self) -> usize {
        self.inner.sitzungen.len()
    }

    pub fn konfig(&self) -> &SitzungsKonfig {
        &self.inner.konfig
    }

    fn mit_sitzung<T>(&self, id: SessionId, f: impl FnOnce(&Sitzung) -> T) -> VoiceResult<T> {
        if let Some(sitzung) = self.inner.sitzungen.get(&id) {
            return Ok(f(&sitzung));
        }
        let sitzung = self
            .inner
            .sitzungen
            .entry(id)
            .or_try_insert_with(|| self.sitzung_erstellen(id))?;
        Ok(f(&sitzung))
    }

    fn sitzung_erstellen(&self, id: SessionId) -> VoiceResult<Sitzung> {
        let inner = &self.inner;
        let wiedergabe = Wiedergabe::neu(Arc::clone(&inner.aufloeser))?;
        let verbindung = Arc::new(Verbindung::neu(
            id,
            Arc::clone(&inner.transport),
            Arc::new(wiedergabe.clone()),
        ));
        let rng = match inner.konfig.zufalls_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ id.inner()),
            None => StdRng::from_os_rng(),
        };
        let beobachter = KanalBeobachter::neu(
            BeobachterKonfig {
                sitzung: id,
                bot_id: inner.konfig.bot_id,
                zeiten: inner.konfig.zeiten,
            },
            Arc::clone(&inner.zugang),
            verbindung,
            wiedergabe,
            Arc::clone(&inner.samples),
            rng,
        );

        let (ereignis_tx, mut ereignis_rx) = mpsc::unbounded_channel::<Uebergang>();
        let worker_beobachter = beobachter.clone();
        let worker = tokio::spawn(async move {
            while let Some(ereignis) = ereignis_rx.recv().await {
                worker_beobachter.verarbeiten(&ereignis);
            }
            tracing::debug!(sitzung = %id, "Ereignis-Worker beendet");
        });

        tracing::info!(sitzung = %id, "Sitzung angelegt");
        Ok(Sitzung {
            beobachter,
            ereignis_tx,
            worker,
        })
    }
}
