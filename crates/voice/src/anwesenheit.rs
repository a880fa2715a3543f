//! Anwesenheit – zuletzt gesehene Kanal-Belegung einer Sitzung
//!
//! Wird aus jedem Uebergang (auch von Bots) aktualisiert und von der
//! Leerlauf-Pruefung gelesen.

use std::sync::Arc;

use dashmap::DashMap;
use grussbot_core::{ChannelId, Kanal, Uebergang};

#[derive(Clone, Default)]
pub struct Anwesenheit {
    kanaele: Arc<DashMap<ChannelId, Kanal>>,
}

impl Anwesenheit {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Uebernimmt beide Snapshots des Ereignisses
    ///
    /// Leere Kanaele werden vergessen, damit die Tabelle nur belegte
    /// Kanaele haelt.
    pub fn aktualisieren(&self, ereignis: &Uebergang) {
        for kanal in [&ereignis.verlassen, &ereignis.beigetreten].into_iter().flatten() {
            if kanal.mitglieder.is_empty() {
                self.kanaele.remove(&kanal.id);
            } else {
                self.kanaele.insert(kanal.id, kanal.clone());
            }
        }
    }

    pub fn kanal(&self, id: ChannelId) -> Option<Kanal> {
        self.kanaele.get(&id).map(|k| k.clone())
    }

    pub fn anzahl(&self) -> usize {
        self.kanaele.len()
    }
}
