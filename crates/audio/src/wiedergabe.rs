//! Wiedergabe – Warteschlange und aktiver Track einer Sitzung
//!
//! Haelt hoechstens einen aktiven Track und eine FIFO-Warteschlange.
//! Steueraufrufe nehmen den Warteschlangen-Lock und schicken Kommandos an
//! den Dekoder-Thread; das Ende eines Tracks kommt von dort ueber
//! [`Wiedergabe::wiedergabe_beendet`] zurueck.
//!
//! Jeder gestartete Track bekommt eine neue Generation. Rueckmeldungen und
//! Frames mit einer anderen Generation als der aktiven werden ignoriert,
//! sodass ein gestoppter oder ersetzter Track nie ein zweites Vorruecken
//! ausloest.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::dekoder::{Dekoder, DekoderBefehl, DekoderFrame};
use crate::error::AudioResult;
use crate::quelle::{AudioAufloeser, EndeGrund, FrameLieferant};
use crate::track::TrackAnfrage;

/// Kapazitaet des Frame-Puffers (50 Frames = 1 Sekunde)
pub const FRAME_PUFFER: usize = 50;

/// Statistiken der Wiedergabe
#[derive(Debug, Clone, Default)]
pub struct WiedergabeStatistik {
    /// An den Transport gelieferte Frames
    pub frames_geliefert: u64,
    /// Verworfene Frames eines veralteten Tracks
    pub frames_verworfen: u64,
    /// Ticks in denen die Pull-Seite abgefangen werden musste
    pub fehler_ticks: u64,
}

struct WarteschlangenZustand {
    aktiv: Option<(TrackAnfrage, u64)>,
    wartend: VecDeque<TrackAnfrage>,
    generation: u64,
}

#[derive(Default)]
struct Zaehler {
    geliefert: AtomicU64,
    verworfen: AtomicU64,
    fehler: AtomicU64,
}

struct WiedergabeInner {
    zustand: Mutex<WarteschlangenZustand>,
    /// Generation des aktiven Tracks (0 = keiner)
    aktive_generation: AtomicU64,
    frame_rx: Receiver<DekoderFrame>,
    dekoder: Dekoder,
    zaehler: Zaehler,
}

/// Wiedergabe-Engine einer Sitzung
///
/// Klonen ist billig und teilt den Zustand.
#[derive(Clone)]
pub struct Wiedergabe {
    inner: Arc<WiedergabeInner>,
}

impl Wiedergabe {
    /// Erstellt eine leere Wiedergabe und startet ihren Dekoder-Thread
    pub fn neu(aufloeser: Arc<dyn AudioAufloeser>) -> AudioResult<Self> {
        let (frame_tx, frame_rx) = bounded::<DekoderFrame>(FRAME_PUFFER);

        let ziel: Arc<OnceLock<Weak<WiedergabeInner>>> = Arc::new(OnceLock::new());
        let melde_ziel = Arc::clone(&ziel);
        let melden = Box::new(move |grund: EndeGrund, generation: u64| {
            if let Some(inner) = melde_ziel.get().and_then(Weak::upgrade) {
                inner.wiedergabe_beendet(grund, generation);
            }
        });

        let dekoder = Dekoder::starten(aufloeser, frame_tx, frame_rx.clone(), melden)?;

        let inner = Arc::new(WiedergabeInner {
            zustand: Mutex::new(WarteschlangenZustand {
                aktiv: None,
                wartend: VecDeque::new(),
                generation: 0,
            }),
            aktive_generation: AtomicU64::new(0),
            frame_rx,
            dekoder,
            zaehler: Zaehler::default(),
        });
        let _ = ziel.set(Arc::downgrade(&inner));

        debug!("Wiedergabe initialisiert");
        Ok(Self { inner })
    }

    /// Startet `track` sofort wenn nichts laeuft, sonst hinten anstellen
    pub fn einreihen_oder_abspielen(&self, track: TrackAnfrage) {
        let mut z = self.inner.zustand.lock();
        if z.aktiv.is_none() {
            self.inner.starten(&mut z, track);
        } else {
            debug!(kennung = %track, laenge = z.wartend.len() + 1, "Track eingereiht");
            z.wartend.push_back(track);
        }
    }

    /// Beendet den aktiven Track und startet den Kopf der Warteschlange
    pub fn weiter(&self) {
        let mut z = self.inner.zustand.lock();
        self.inner.vorruecken(&mut z);
    }

    /// Stellt `tracks` vor die Warteschlange und startet den ersten davon
    ///
    /// Der bisher aktive Track wird gestoppt; die restliche Warteschlange
    /// bleibt hinter den neuen Tracks erhalten.
    pub fn vorziehen(&self, tracks: Vec<TrackAnfrage>) {
        if tracks.is_empty() {
            return;
        }
        let mut z = self.inner.zustand.lock();
        for track in tracks.into_iter().rev() {
            z.wartend.push_front(track);
        }
        self.inner.vorruecken(&mut z);
    }

    /// Rueckmeldung des Dekoders
    pub fn wiedergabe_beendet(&self, grund: EndeGrund, generation: u64) {
        self.inner.wiedergabe_beendet(grund, generation);
    }

    /// Leert die Warteschlange und stoppt den aktiven Track (idempotent)
    pub fn leeren_und_stoppen(&self) {
        let mut z = self.inner.zustand.lock();
        let verworfen = z.wartend.len();
        z.wartend.clear();
        if let Some((track, generation)) = z.aktiv.take() {
            self.inner.aktive_generation.store(0, Ordering::Release);
            self.inner
                .dekoder
                .senden(DekoderBefehl::Stoppen { generation });
            info!(kennung = %track, verworfen, "Wiedergabe gestoppt und Warteschlange geleert");
        } else if verworfen > 0 {
            info!(verworfen, "Warteschlange geleert");
        }
    }

    /// Naechster Frame fuer den Transport oder `None` (Stille)
    ///
    /// Blockiert nie. Ein Fehler innerhalb eines Ticks wird abgefangen und
    /// als Stille behandelt.
    pub fn frame_holen(&self) -> Option<Bytes> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.inner.frame_aus_puffer())) {
            Ok(frame) => frame,
            Err(_) => {
                self.inner.zaehler.fehler.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn aktiver_track(&self) -> Option<TrackAnfrage> {
        self.inner.zustand.lock().aktiv.as_ref().map(|(t, _)| t.clone())
    }

    /// Kopie der wartenden Tracks in Reihenfolge
    pub fn warteschlange(&self) -> Vec<TrackAnfrage> {
        self.inner.zustand.lock().wartend.iter().cloned().collect()
    }

    pub fn ist_leerlauf(&self) -> bool {
        let z = self.inner.zustand.lock();
        z.aktiv.is_none() && z.wartend.is_empty()
    }

    pub fn statistik(&self) -> WiedergabeStatistik {
        let zaehler = &self.inner.zaehler;
        WiedergabeStatistik {
            frames_geliefert: zaehler.geliefert.load(Ordering::Relaxed),
            frames_verworfen: zaehler.verworfen.load(Ordering::Relaxed),
            fehler_ticks: zaehler.fehler.load(Ordering::Relaxed),
        }
    }
}

impl FrameLieferant for Wiedergabe {
    fn frame_holen(&self) -> Option<Bytes> {
        Wiedergabe::frame_holen(self)
    }
}

impl WiedergabeInner {
    fn starten(&self, z: &mut WarteschlangenZustand, track: TrackAnfrage) {
        z.generation += 1;
        let generation = z.generation;
        self.aktive_generation.store(generation, Ordering::Release);
        info!(kennung = %track, generation, "Track startet");
        self.dekoder.senden(DekoderBefehl::Starten {
            anfrage: track.clone(),
            generation,
        });
        z.aktiv = Some((track, generation));
    }

    fn vorruecken(&self, z: &mut WarteschlangenZustand) {
        match z.wartend.pop_front() {
            // Der Dekoder meldet den alten Track als ersetzt
            Some(track) => self.starten(z, track),
            None => {
                if let Some((track, generation)) = z.aktiv.take() {
                    self.aktive_generation.store(0, Ordering::Release);
                    self.dekoder.senden(DekoderBefehl::Stoppen { generation });
                    debug!(kennung = %track, "Warteschlange leer, Wiedergabe im Leerlauf");
                }
            }
        }
    }

    fn wiedergabe_beendet(&self, grund: EndeGrund, generation: u64) {
        let mut z = self.zustand.lock();
        match z.aktiv.as_ref() {
            Some((_, aktiv)) if *aktiv == generation => {}
            _ => {
                trace!(?grund, generation, "Veraltete Rueckmeldung ignoriert");
                return;
            }
        }
        debug!(?grund, generation, "Track beendet");
        if grund.darf_naechsten_starten() {
            self.vorruecken(&mut z);
        }
    }

    fn frame_aus_puffer(&self) -> Option<Bytes> {
        let aktiv = self.aktive_generation.load(Ordering::Acquire);
        if aktiv == 0 {
            return None;
        }
        loop {
            match self.frame_rx.try_recv() {
                Ok(frame) if frame.generation == aktiv => {
                    self.zaehler.geliefert.fetch_add(1, Ordering::Relaxed);
                    return Some(frame.daten);
                }
                Ok(_) => {
                    self.zaehler.verworfen.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => return None,
            }
        }
    }
}
