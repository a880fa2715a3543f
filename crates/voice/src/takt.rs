//! Frame-Takt – zieht alle 20 ms einen Frame und gibt ihn an die Senke

use std::sync::Arc;

use bytes::Bytes;
use grussbot_audio::{FrameLieferant, FRAME_DAUER};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Netzwerkseite des Takts
pub trait FrameSenke: Send + 'static {
    fn senden(&mut self, frame: Bytes);

    /// Tick ohne Frame
    fn stille(&mut self) {}
}

/// Handle auf den Takt-Task; beim Drop wird der Task beendet
pub struct TaktHandle {
    task: JoinHandle<()>,
}

impl TaktHandle {
    pub fn stoppen(&self) {
        self.task.abort();
    }
}

impl Drop for TaktHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Startet den 20-ms-Takt fuer `lieferant`
///
/// Verpasste Ticks werden uebersprungen statt nachgeholt.
pub fn frame_takt_starten<S: FrameSenke>(lieferant: Arc<dyn FrameLieferant>, mut senke: S) -> TaktHandle {
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FRAME_DAUER);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match lieferant.frame_holen() {
                Some(frame) => senke.senden(frame),
                None => senke.stille(),
            }
        }
    });
    TaktHandle { task }
}
