//! grussbot-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Grussbot-Crates gemeinsam genutzt werden: IDs, Kanal-Snapshots,
//! das Uebergangs-Ereignis des Gateways und den zentralen Fehler-Enum.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{GrussbotError, Result};
pub use event::{Uebergang, UebergangsArt};
pub use types::{ChannelId, Kanal, MemberId, Mitglied, SessionId};
