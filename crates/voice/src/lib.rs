//! grussbot-voice – Anwesenheits-Zustandsautomat
//!
//! ## Module
//! - [`beobachter`] – Klassifikation und Regeltabellen fuer Uebergaenge
//! - [`verbindung`] – Sprachverbindung einer Sitzung mit Epoche
//! - [`planer`] – Verzoegerte, epochengepruefte Aktionen
//! - [`zugang`] – Kanalliste und reservierter Kanal
//! - [`anwesenheit`] – Zuletzt gesehene Kanal-Belegung
//! - [`sitzung`] – Registry aller Sitzungen mit Ereignis-Workern
//! - [`takt`] – 20-ms-Frame-Takt

pub mod anwesenheit;
pub mod beobachter;
pub mod error;
pub mod planer;
pub mod sitzung;
pub mod takt;
pub mod verbindung;
pub mod zugang;

pub use beobachter::{Entscheidung, KanalBeobachter, VerbindungsAktion, WarteschlangenAktion};
pub use error::{VoiceError, VoiceResult};
pub use planer::{GeplanteAktion, Planer, Verzoegerungen};
pub use sitzung::{SitzungsKonfig, SitzungsVerwaltung};
pub use takt::{frame_takt_starten, FrameSenke, TaktHandle};
pub use verbindung::{SprachTransport, Verbindung, VerbindungsZustand};
pub use zugang::{DateiKanalListe, KanalListe, Zugangspruefer};
