//! grussbot-audio – Wiedergabe-Engine
//!
//! - Warteschlange mit genau einem aktiven Track ([`Wiedergabe`])
//! - Dekoder-Thread mit begrenztem Frame-Puffer
//! - Pull-Schnittstelle fuer den 20-ms-Takt ([`FrameLieferant`])
//! - Sample-Pools fuer Willkommen, Abschied und Abspielbefehl
//!
//! Audio wird weder dekodiert noch kodiert: Frames sind vorkodiertes Opus.

mod dekoder;
pub mod error;
pub mod quelle;
pub mod samples;
pub mod track;
pub mod wiedergabe;

pub use error::{AudioError, AudioResult};
pub use quelle::{AudioAufloeser, EndeGrund, FrameListe, FrameLieferant, FrameQuelle, FRAME_DAUER};
pub use samples::{SamplePools, SampleQuellen};
pub use track::{QuellenArt, TrackAnfrage, SPRACH_SCHEMA};
pub use wiedergabe::{Wiedergabe, WiedergabeStatistik, FRAME_PUFFER};
