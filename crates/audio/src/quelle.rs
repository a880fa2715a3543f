//! Schnittstellen zwischen Wiedergabe, Aufloesung und Transport

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;

use crate::error::AudioResult;
use crate::track::TrackAnfrage;

/// Dauer eines Opus-Frames
pub const FRAME_DAUER: Duration = Duration::from_millis(20);

/// Liefert die vorkodierten Opus-Frames eines Tracks nacheinander
pub trait FrameQuelle: Send {
    /// Naechster Frame, `Ok(None)` am Ende des Tracks
    fn naechster_frame(&mut self) -> AudioResult<Option<Bytes>>;
}

/// Uebersetzt eine [`TrackAnfrage`] in eine [`FrameQuelle`]
///
/// Wird ausschliesslich vom Dekoder-Thread aufgerufen und darf blockieren.
pub trait AudioAufloeser: Send + Sync {
    fn aufloesen(&self, anfrage: &TrackAnfrage) -> AudioResult<Box<dyn FrameQuelle>>;
}

/// Pull-Seite fuer den Sprach-Transport (ein Aufruf pro 20-ms-Tick)
pub trait FrameLieferant: Send + Sync {
    /// Naechster Frame oder `None` (Stille)
    fn frame_holen(&self) -> Option<Bytes>;

    /// Frames sind bereits Opus-kodiert
    fn ist_opus(&self) -> bool {
        true
    }
}

/// Grund fuer das Ende eines Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndeGrund {
    /// Quelle regulaer erschoepft
    Fertig,
    /// Aufloesung oder Lesen fehlgeschlagen
    LadenFehlgeschlagen,
    /// Explizit gestoppt
    Gestoppt,
    /// Durch einen anderen Track ersetzt
    Ersetzt,
}

impl EndeGrund {
    /// Nur natuerliches Ende und Ladefehler ruecken die Warteschlange vor
    pub fn darf_naechsten_starten(self) -> bool {
        matches!(self, Self::Fertig | Self::LadenFehlgeschlagen)
    }
}

/// Bereits im Speicher liegende Frames
#[derive(Debug, Default)]
pub struct FrameListe {
    frames: VecDeque<Bytes>,
}

impl FrameListe {
    pub fn neu(frames: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn verbleibend(&self) -> usize {
        self.frames.len()
    }
}

impl FrameQuelle for FrameListe {
    fn naechster_frame(&mut self) -> AudioResult<Option<Bytes>> {
        Ok(self.frames.pop_front())
    }
}
