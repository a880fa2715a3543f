//! Sample-Pools fuer Willkommen, Abschied, Themen und Abspielbefehl
//!
//! Die Pools werden beim Start aus Verzeichnissen mit `.opus`-Dateien
//! geladen. Ein fehlendes Verzeichnis ergibt einen leeren Pool; die Auswahl
//! aus einem leeren Pool liefert `None`.

use std::path::{Path, PathBuf};

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AudioResult;
use crate::track::TrackAnfrage;

/// Verzeichnisse und Schluesselwoerter der Sample-Pools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleQuellen {
    pub willkommen: Option<PathBuf>,
    pub abschied: Option<PathBuf>,
    /// Themen-Pool, ersetzt den Willkommens-Pool bei Schluesselwort-Treffer
    pub thema: Option<PathBuf>,
    /// Samples fuer den Abspielbefehl
    pub abspielen: Option<PathBuf>,
    pub themen_schluesselwoerter: Vec<String>,
}

/// Geladene Sample-Pools
#[derive(Debug, Clone, Default)]
pub struct SamplePools {
    willkommen: Vec<PathBuf>,
    abschied: Vec<PathBuf>,
    thema: Vec<PathBuf>,
    abspielen: Vec<PathBuf>,
    /// In Grossbuchstaben
    schluesselwoerter: Vec<String>,
}

impl SamplePools {
    pub fn neu(
        willkommen: Vec<PathBuf>,
        abschied: Vec<PathBuf>,
        thema: Vec<PathBuf>,
        mut abspielen: Vec<PathBuf>,
        schluesselwoerter: Vec<String>,
    ) -> Self {
        abspielen.sort_by_key(|p| dateistamm(p).to_lowercase());
        Self {
            willkommen,
            abschied,
            thema,
            abspielen,
            schluesselwoerter: schluesselwoerter
                .into_iter()
                .map(|s| s.to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Laedt alle Pools aus den konfigurierten Verzeichnissen
    pub fn laden(quellen: &SampleQuellen) -> AudioResult<Self> {
        let pools = Self::neu(
            pool_laden("willkommen", quellen.willkommen.as_deref())?,
            pool_laden("abschied", quellen.abschied.as_deref())?,
            pool_laden("thema", quellen.thema.as_deref())?,
            pool_laden("abspielen", quellen.abspielen.as_deref())?,
            quellen.themen_schluesselwoerter.clone(),
        );
        info!(
            willkommen = pools.willkommen.len(),
            abschied = pools.abschied.len(),
            thema = pools.thema.len(),
            abspielen = pools.abspielen.len(),
            "Sample-Pools geladen"
        );
        Ok(pools)
    }

    /// Zufaelliges Willkommens-Sample fuer den Kanal `kanalname`
    ///
    /// Enthaelt der Name ein Themen-Schluesselwort, wird der Themen-Pool
    /// verwendet (sofern nicht leer).
    pub fn willkommen_waehlen<R: Rng + ?Sized>(
        &self,
        kanalname: &str,
        rng: &mut R,
    ) -> Option<TrackAnfrage> {
        let gross = kanalname.to_uppercase();
        let pool = match self
            .schluesselwoerter
            .iter()
            .find(|k| gross.contains(k.as_str()))
        {
            Some(wort) if !self.thema.is_empty() => {
                debug!(kanal = kanalname, schluesselwort = %wort, "Themen-Pool ausgewaehlt");
                &self.thema
            }
            _ => &self.willkommen,
        };
        waehlen("willkommen", pool, rng)
    }

    /// Zufaelliges Abschieds-Sample (ohne Themenfilter)
    pub fn abschied_waehlen<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<TrackAnfrage> {
        waehlen("abschied", &self.abschied, rng)
    }

    /// Sample des Abspielbefehls nach Name (Dateiname ohne Endung)
    pub fn abspiel_sample(&self, name: &str) -> Option<TrackAnfrage> {
        self.abspielen
            .iter()
            .find(|p| dateistamm(p).eq_ignore_ascii_case(name))
            .map(TrackAnfrage::sample)
    }

    /// Namen aller abspielbaren Samples, sortiert ohne Gross-/Kleinschreibung
    pub fn abspiel_namen(&self) -> Vec<String> {
        self.abspielen.iter().map(|p| dateistamm(p)).collect()
    }
}

fn waehlen<R: Rng + ?Sized>(pool_name: &str, pool: &[PathBuf], rng: &mut R) -> Option<TrackAnfrage> {
    match pool.choose(rng) {
        Some(pfad) => Some(TrackAnfrage::sample(pfad)),
        None => {
            warn!(pool = pool_name, "Sample-Pool ist leer");
            None
        }
    }
}

fn dateistamm(pfad: &Path) -> String {
    pfad.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Listet alle `.opus`-Dateien eines Verzeichnisses
fn pool_laden(name: &str, verzeichnis: Option<&Path>) -> AudioResult<Vec<PathBuf>> {
    let Some(verzeichnis) = verzeichnis else {
        debug!(pool = name, "Kein Verzeichnis konfiguriert");
        return Ok(Vec::new());
    };
    if !verzeichnis.is_dir() {
        warn!(pool = name, pfad = %verzeichnis.display(), "Sample-Verzeichnis nicht gefunden");
        return Ok(Vec::new());
    }

    let mut dateien = Vec::new();
    for eintrag in std::fs::read_dir(verzeichnis)? {
        let pfad = eintrag?.path();
        let ist_opus = pfad
            .extension()
            .map(|e| e.eq_ignore_ascii_case("opus"))
            .unwrap_or(false);
        if pfad.is_file() && ist_opus {
            dateien.push(pfad);
        }
    }
    dateien.sort();
    Ok(dateien)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pfade(namen: &[&str]) -> Vec<PathBuf> {
        namen.iter().map(|n| PathBuf::from(format!("/s/{n}.opus"))).collect()
    }

    #[test]
    fn themen_pool_bei_schluesselwort() {
        let pools = SamplePools::neu(
            pfade(&["hallo"]),
            pfade(&["tschuess"]),
            pfade(&["herz"]),
            vec![],
            vec!["loveeeeee".into()],
        );
        let mut rng = StdRng::seed_from_u64(7);

        let t = pools.willkommen_waehlen("LoveEEEEEE Lounge", &mut rng).unwrap();
        assert_eq!(t.anzeigename(), "herz");

        let t = pools.willkommen_waehlen("General", &mut rng).unwrap();
        assert_eq!(t.anzeigename(), "hallo");

        assert_eq!(pools.abschied_waehlen(&mut rng).unwrap().anzeigename(), "tschuess");
    }

    #[test]
    fn leerer_themen_pool_faellt_zurueck() {
        let pools = SamplePools::neu(pfade(&["hallo"]), vec![], vec![], vec![], vec!["X".into()]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            pools.willkommen_waehlen("x-kanal", &mut rng).unwrap().anzeigename(),
            "hallo"
        );
        assert!(pools.abschied_waehlen(&mut rng).is_none());
    }

    #[test]
    fn gleicher_seed_gleiche_auswahl() {
        let pools = SamplePools::neu(pfade(&["a", "b", "c", "d", "e"]), vec![], vec![], vec![], vec![]);
        let folge = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..8)
                .map(|_| pools.willkommen_waehlen("General", &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(folge(42), folge(42));
    }

    #[test]
    fn abspiel_samples_sortiert_und_auffindbar() {
        let pools = SamplePools::neu(vec![], vec![], vec![], pfade(&["zebra", "Affe", "maus"]), vec![]);
        assert_eq!(pools.abspiel_namen(), vec!["Affe", "maus", "zebra"]);
        assert!(pools.abspiel_sample("AFFE").is_some());
        assert!(pools.abspiel_sample("hund").is_none());
    }

    #[test]
    fn laden_aus_verzeichnis_filtert_opus() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.opus", "B.OPUS", "notiz.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let quellen = SampleQuellen {
            willkommen: Some(dir.path().to_path_buf()),
            abspielen: Some(dir.path().to_path_buf()),
            abschied: Some(dir.path().join("fehlt")),
            ..Default::default()
        };
        let pools = SamplePools::laden(&quellen).unwrap();
        assert_eq!(pools.abspiel_namen(), vec!["a", "B"]);
        assert_eq!(pools.willkommen.len(), 2);
        assert!(pools.abschied.is_empty());
    }
}
