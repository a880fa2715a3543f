//! Planer – verzoegerte Aktionen auf der Zeitachse einer Verbindung
//!
//! Eine geplante Aktion merkt sich die Epoche bei der Planung. Beim Feuern
//! nimmt sie die Ordnungssperre der Sitzung (dieselbe, die der
//! Kanal-Beobachter waehrend eines Ereignisses haelt) und laeuft nur, wenn
//! die Epoche unveraendert ist.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Liefert die aktuelle Epoche einer Verbindung
pub trait Epochenquelle: Send + Sync {
    fn epoche(&self) -> u64;
}

/// Verzoegerungen des Anwesenheits-Automaten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verzoegerungen {
    /// Pause zwischen Trennen und erneutem Verbinden beim Kanalwechsel
    pub wiederverbinden: Duration,
    /// Entprellung der Begruessung
    pub begruessung: Duration,
    pub abschied: Duration,
    /// Periode der Leerlauf-Pruefung
    pub leerlauf_intervall: Duration,
}

impl Default for Verzoegerungen {
    fn default() -> Self {
        Self {
            wiederverbinden: Duration::from_millis(100),
            begruessung: Duration::from_millis(500),
            abschied: Duration::from_millis(200),
            leerlauf_intervall: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Handle auf eine geplante Aktion
#[derive(Debug)]
pub struct GeplanteAktion {
    handle: JoinHandle<()>,
    abgebrochen: Arc<AtomicBool>,
    epoche: u64,
}

impl GeplanteAktion {
    /// Bricht die Aktion ab (wirkungslos wenn sie schon gelaufen ist)
    pub fn abbrechen(&self) {
        self.abgebrochen.store(true, Ordering::Release);
        self.handle.abort();
    }

    pub fn ist_beendet(&self) -> bool {
        self.handle.is_finished()
    }

    /// Epoche zum Zeitpunkt der Planung
    pub fn epoche(&self) -> u64 {
        self.epoche
    }
}

/// Planer einer Sitzung
#[derive(Clone)]
pub struct Planer {
    quelle: Arc<dyn Epochenquelle>,
    reihenfolge: Arc<Mutex<()>>,
}

impl Planer {
    pub fn neu(quelle: Arc<dyn Epochenquelle>) -> Self {
        Self {
            quelle,
            reihenfolge: Arc::new(Mutex::new(())),
        }
    }

    /// Ordnungssperre der Sitzung
    ///
    /// Nicht reentrant: Aktionen laufen bereits unter dieser Sperre.
    pub fn sperre(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.reihenfolge.lock()
    }

    pub fn aktuelle_epoche(&self) -> u64 {
        self.quelle.epoche()
    }

    /// Fuehrt `aktion` nach `verzoegerung` aus, falls die Epoche dann noch
    /// `epoche` ist
    pub fn planen<F>(&self, verzoegerung: Duration, epoche: u64, aktion: F) -> GeplanteAktion
    where
        F: FnOnce() + Send + 'static,
    {
        let quelle = Arc::clone(&self.quelle);
        let reihenfolge = Arc::clone(&self.reihenfolge);
        let abgebrochen = Arc::new(AtomicBool::new(false));
        let abbruch = Arc::clone(&abgebrochen);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(verzoegerung).await;

            let _sperre = reihenfolge.lock();
            if abbruch.load(Ordering::Acquire) {
                tracing::trace!(epoche, "Geplante Aktion abgebrochen");
                return;
            }
            let aktuell = quelle.epoche();
            if aktuell != epoche {
                tracing::debug!(
                    geplant = epoche,
                    aktuell,
                    "Geplante Aktion verworfen (Epoche veraltet)"
                );
                return;
            }
            aktion();
        });

        GeplanteAktion {
            handle,
            abgebrochen,
            epoche,
        }
    }
}

/// Startet eine periodische Aufgabe; der erste Lauf erfolgt sofort
pub fn intervall_starten<F, Fut>(periode: Duration, mut aufgabe: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(periode);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            aufgabe().await;
        }
    })
}
