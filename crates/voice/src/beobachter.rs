//! Kanal-Beobachter – Zustandsautomat fuer Anwesenheits-Uebergaenge
//!
//! Jedes Ereignis wird klassifiziert ([`UebergangsArt`]) und gegen zwei
//! unabhaengige Regeltabellen geprueft, eine fuer die Verbindung und eine
//! fuer die Warteschlange. Pro Tabelle gewinnt die erste passende Regel.
//!
//! Verbindung:
//!
//! | Regel | Bedingung | Aktion |
//! |---|---|---|
//! | verbinden | Ziel erlaubt, nicht verbunden | verbinden |
//! | umziehen | Beitritt oder Wechsel, Ziel erlaubt, anderswo verbunden | leeren, trennen, nach 100 ms verbinden |
//! | reserviert | Wechsel in den reservierten Kanal, Bot allein zurueck | leeren, trennen |
//! | gesperrt | Wechsel in gesperrten Kanal, Bot allein zurueck | leeren, trennen |
//! | allein | Austritt, Bot allein zurueck | leeren, trennen |
//! | nur_bots | Austritt, nur Bots (> 1) im eigenen Kanal | leeren, trennen |
//!
//! Warteschlange:
//!
//! | Regel | Bedingung | Aktion |
//! |---|---|---|
//! | leeren_begruessen | Wechsel, Quelle hat noch Menschen | leeren; nach 500 ms Gruss + Willkommen anstellen |
//! | vorziehen_begruessen | Beitritt oder Wechsel aus menschenleerer Quelle | nach 500 ms Gruss + Willkommen vorziehen |
//! | verabschieden | Austritt aus dem eigenen Kanal, > 1 verbleibend | nach 200 ms Abschied anstellen |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use grussbot_audio::{SamplePools, TrackAnfrage, Wiedergabe};
use grussbot_core::{ChannelId, Kanal, MemberId, Mitglied, SessionId, Uebergang, UebergangsArt};
use parking_lot::Mutex;
use rand::rngs::StdRng;

use crate::anwesenheit::Anwesenheit;
use crate::error::{VoiceError, VoiceResult};
use crate::planer::{Epochenquelle, GeplanteAktion, Planer, Verzoegerungen};
use crate::verbindung::Verbindung;
use crate::zugang::Zugangspruefer;

// ---------------------------------------------------------------------------
// Entscheidungen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsAktion {
    Verbinden,
    Umziehen,
    ReserviertTrennen,
    GesperrtTrennen,
    AlleinTrennen,
    NurBotsTrennen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarteschlangenAktion {
    LeerenUndBegruessen,
    VorziehenUndBegruessen,
    Verabschieden,
}

/// Ergebnis der Regelauswertung fuer ein Ereignis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Entscheidung {
    pub verbindung: Option<VerbindungsAktion>,
    pub warteschlange: Option<WarteschlangenAktion>,
}

// ---------------------------------------------------------------------------
// Regeltabellen
// ---------------------------------------------------------------------------

/// Alles was die Regeln ueber ein Ereignis wissen muessen
struct Lage<'a> {
    art: UebergangsArt<'a>,
    bot_id: MemberId,
    verbunden: bool,
    aktueller_kanal: Option<ChannelId>,
    ziel_reserviert: bool,
    ziel_auf_liste: bool,
    quelle_reserviert: bool,
}

impl<'a> Lage<'a> {
    fn ziel(&self) -> Option<&'a Kanal> {
        match self.art {
            UebergangsArt::NurBeitritt { ziel } | UebergangsArt::Wechsel { ziel, .. } => Some(ziel),
            UebergangsArt::NurAustritt { .. } => None,
        }
    }

    fn quelle(&self) -> Option<&'a Kanal> {
        match self.art {
            UebergangsArt::NurAustritt { quelle } | UebergangsArt::Wechsel { quelle, .. } => {
                Some(quelle)
            }
            UebergangsArt::NurBeitritt { .. } => None,
        }
    }

    fn ist_wechsel(&self) -> bool {
        matches!(self.art, UebergangsArt::Wechsel { .. })
    }

    fn ist_austritt(&self) -> bool {
        matches!(self.art, UebergangsArt::NurAustritt { .. })
    }

    fn ziel_erlaubt(&self) -> bool {
        self.ziel().is_some() && !self.ziel_reserviert && !self.ziel_auf_liste
    }

    fn bot_allein_in_quelle(&self) -> bool {
        self.quelle().is_some_and(|q| q.nur(self.bot_id))
    }

    /// Quelle ist der Kanal, in dem die Sitzung gerade verbunden ist
    fn quelle_ist_eigener_kanal(&self) -> bool {
        self.quelle()
            .is_some_and(|q| self.aktueller_kanal == Some(q.id))
    }
}

struct Regel<A> {
    name: &'static str,
    passt: fn(&Lage<'_>) -> bool,
    aktion: A,
}

fn erste_passende<A: Copy>(regeln: &[Regel<A>], lage: &Lage<'_>) -> Option<(&'static str, A)> {
    regeln
        .iter()
        .find(|r| (r.passt)(lage))
        .map(|r| (r.name, r.aktion))
}

fn regel_verbinden(l: &Lage<'_>) -> bool {
    l.ziel_erlaubt() && !l.verbunden
}

/// Auch ein reiner Beitritt zieht den anderswo verbundenen Bot nach
fn regel_umziehen(l: &Lage<'_>) -> bool {
    l.ziel_erlaubt()
        && l.verbunden
        && l.aktueller_kanal != l.ziel().map(|k| k.id)
}

fn regel_reserviert_trennen(l: &Lage<'_>) -> bool {
    l.ist_wechsel() && l.ziel_reserviert && l.bot_allein_in_quelle()
}

fn regel_gesperrt_trennen(l: &Lage<'_>) -> bool {
    l.ist_wechsel() && l.ziel_auf_liste && l.bot_allein_in_quelle()
}

fn regel_allein_trennen(l: &Lage<'_>) -> bool {
    l.ist_austritt() && l.bot_allein_in_quelle()
}

fn regel_nur_bots_trennen(l: &Lage<'_>) -> bool {
    l.ist_austritt()
        && !l.quelle_reserviert
        && l.quelle_ist_eigener_kanal()
        && l.quelle().is_some_and(|q| q.anzahl() > 1 && q.nur_bots())
}

fn regel_leeren_begruessen(l: &Lage<'_>) -> bool {
    l.ist_wechsel() && l.ziel_erlaubt() && l.quelle().is_some_and(Kanal::hat_menschen)
}

fn regel_vorziehen_begruessen(l: &Lage<'_>) -> bool {
    l.ziel_erlaubt()
        && match l.art {
            UebergangsArt::NurBeitritt { .. } => true,
            UebergangsArt::Wechsel { quelle, .. } => !quelle.hat_menschen(),
            UebergangsArt::NurAustritt { .. } => false,
        }
}

fn regel_verabschieden(l: &Lage<'_>) -> bool {
    l.ist_austritt()
        && !l.quelle_reserviert
        && l.quelle_ist_eigener_kanal()
        && l.quelle().is_some_and(|q| q.anzahl() > 1)
}

const VERBINDUNGS_REGELN: &[Regel<VerbindungsAktion>] = &[
    Regel {
        name: "verbinden",
        passt: regel_verbinden,
        aktion: VerbindungsAktion::Verbinden,
    },
    Regel {
        name: "umziehen",
        passt: regel_umziehen,
        aktion: VerbindungsAktion::Umziehen,
    },
    Regel {
        name: "reserviert",
        passt: regel_reserviert_trennen,
        aktion: VerbindungsAktion::ReserviertTrennen,
    },
    Regel {
        name: "gesperrt",
        passt: regel_gesperrt_trennen,
        aktion: VerbindungsAktion::GesperrtTrennen,
    },
    Regel {
        name: "allein",
        passt: regel_allein_trennen,
        aktion: VerbindungsAktion::AlleinTrennen,
    },
    Regel {
        name: "nur_bots",
        passt: regel_nur_bots_trennen,
        aktion: VerbindungsAktion::NurBotsTrennen,
    },
];

const WARTESCHLANGEN_REGELN: &[Regel<WarteschlangenAktion>] = &[
    Regel {
        name: "leeren_begruessen",
        passt: regel_leeren_begruessen,
        aktion: WarteschlangenAktion::LeerenUndBegruessen,
    },
    Regel {
        name: "vorziehen_begruessen",
        passt: regel_vorziehen_begruessen,
        aktion: WarteschlangenAktion::VorziehenUndBegruessen,
    },
    Regel {
        name: "verabschieden",
        passt: regel_verabschieden,
        aktion: WarteschlangenAktion::Verabschieden,
    },
];

// ---------------------------------------------------------------------------
// KanalBeobachter
// ---------------------------------------------------------------------------

/// Feste Parameter eines Beobachters
#[derive(Debug, Clone, Copy)]
pub struct BeobachterKonfig {
    pub sitzung: SessionId,
    /// Eigene Mitglieds-ID des Bots
    pub bot_id: MemberId,
    pub zeiten: Verzoegerungen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GrussModus {
    /// Hinten anstellen (Warteschlange wurde geleert)
    Anstellen,
    /// Aktuellen Track ueberspringen, Gruss an die Spitze
    Vorziehen,
}

struct Begruessung {
    modus: GrussModus,
    mitglied: Mitglied,
    kanal: Kanal,
}

struct BeobachterInner {
    konfig: BeobachterKonfig,
    zugang: Arc<Zugangspruefer>,
    verbindung: Arc<Verbindung>,
    wiedergabe: Wiedergabe,
    samples: Arc<SamplePools>,
    planer: Planer,
    anwesenheit: Anwesenheit,
    rng: Mutex<StdRng>,
    /// Ausstehende Begruessungen, hoechstens eine pro Mitglied
    ausstehende_gruesse: Mutex<HashMap<MemberId, GeplanteAktion>>,
}

/// Zustandsautomat einer Sitzung
///
/// Klonen ist billig und teilt den Zustand.
#[derive(Clone)]
pub struct KanalBeobachter {
    inner: Arc<BeobachterInner>,
}

impl KanalBeobachter {
    pub fn neu(
        konfig: BeobachterKonfig,
        zugang: Arc<Zugangspruefer>,
        verbindung: Arc<Verbindung>,
        wiedergabe: Wiedergabe,
        samples: Arc<SamplePools>,
        rng: StdRng,
    ) -> Self {
        let planer = Planer::neu(verbindung.clone());
        Self {
            inner: Arc::new(BeobachterInner {
                konfig,
                zugang,
                verbindung,
                wiedergabe,
                samples,
                planer,
                anwesenheit: Anwesenheit::neu(),
                rng: Mutex::new(rng),
                ausstehende_gruesse: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Verarbeitet ein Ereignis unter der Ordnungssperre der Sitzung
    pub fn verarbeiten(&self, ereignis: &Uebergang) -> Entscheidung {
        let inner = &self.inner;
        let _sperre = inner.planer.sperre();

        inner.anwesenheit.aktualisieren(ereignis);

        if ereignis.mitglied.ist_bot {
            tracing::trace!(
                sitzung = %inner.konfig.sitzung,
                mitglied = %ereignis.mitglied.id,
                "Bot-Ereignis ignoriert"
            );
            return Entscheidung::default();
        }
        let Some(art) = ereignis.art() else {
            return Entscheidung::default();
        };

        let lage = inner.lage_erfassen(art);
        let verbindung = erste_passende(VERBINDUNGS_REGELN, &lage);
        let warteschlange = erste_passende(WARTESCHLANGEN_REGELN, &lage);

        tracing::debug!(
            sitzung = %inner.konfig.sitzung,
            mitglied = %ereignis.mitglied.name,
            art = art_name(&lage.art),
            verbindung = verbindung.map(|(n, _)| n).unwrap_or("-"),
            warteschlange = warteschlange.map(|(n, _)| n).unwrap_or("-"),
            "Uebergang ausgewertet"
        );

        let entscheidung = Entscheidung {
            verbindung: verbindung.map(|(_, a)| a),
            warteschlange: warteschlange.map(|(_, a)| a),
        };
        inner.ausfuehren(entscheidung, &lage, &ereignis.mitglied);
        entscheidung
    }

    /// Verbindet mit `kanal`, sofern erlaubt (Befehle)
    pub fn beitreten(&self, kanal: &Kanal) -> VoiceResult<()> {
        let _sperre = self.inner.planer.sperre();
        if !self.inner.zugang.ist_erlaubt(kanal) {
            return Err(VoiceError::KanalNichtErlaubt(kanal.name.clone()));
        }
        self.inner.verbindung.verbinden(kanal)
    }

    /// Stellt Sprachsynthese fuer `text` an
    pub fn sprechen(&self, text: &str) {
        let _sperre = self.inner.planer.sperre();
        self.inner
            .wiedergabe
            .einreihen_oder_abspielen(TrackAnfrage::sprache(text));
    }

    /// Spielt `track` sofort; die restliche Warteschlange bleibt erhalten
    pub fn sofort_abspielen(&self, track: TrackAnfrage) {
        let _sperre = self.inner.planer.sperre();
        self.inner.wiedergabe.vorziehen(vec![track]);
    }

    /// Sperrt bzw. entsperrt `kanalname` auf der Kanalliste
    ///
    /// Wird der Kanal gesperrt, in dem die Sitzung gerade ist, wird
    /// getrennt. Gibt `true` zurueck wenn der Kanal danach gesperrt ist.
    pub fn kanalliste_umschalten(&self, kanalname: &str) -> VoiceResult<bool> {
        let inner = &self.inner;
        let _sperre = inner.planer.sperre();
        let gesperrt = inner.zugang.umschalten(kanalname)?;
        if gesperrt {
            let ziel = inner.zugang.normalisieren(kanalname);
            let aktuell = inner.verbindung.zustand().kanalname;
            if aktuell.is_some_and(|n| inner.zugang.normalisieren(&n) == ziel) {
                tracing::info!(
                    sitzung = %inner.konfig.sitzung,
                    kanal = %ziel,
                    "Aktueller Kanal gesperrt, trenne"
                );
                inner.trennen_und_leeren();
            }
        }
        Ok(gesperrt)
    }

    /// Trennt, wenn der Bot allein in seinem Kanal ist (laut Anwesenheit)
    pub fn leerlauf_pruefen(&self) -> bool {
        let inner = &self.inner;
        let _sperre = inner.planer.sperre();
        let Some(kanal_id) = inner.verbindung.aktueller_kanal() else {
            return false;
        };
        match inner.anwesenheit.kanal(kanal_id) {
            Some(kanal) if kanal.nur(inner.konfig.bot_id) => {
                tracing::info!(
                    sitzung = %inner.konfig.sitzung,
                    kanal = %kanal_id,
                    "Bot allein im Kanal, trenne"
                );
                inner.trennen_und_leeren();
                true
            }
            _ => false,
        }
    }

    /// Leert, stoppt und trennt
    pub fn beenden(&self) {
        let _sperre = self.inner.planer.sperre();
        self.inner.trennen_und_leeren();
    }

    pub fn sitzung(&self) -> SessionId {
        self.inner.konfig.sitzung
    }

    pub fn wiedergabe(&self) -> &Wiedergabe {
        &self.inner.wiedergabe
    }

    pub fn verbindung(&self) -> &Verbindung {
        &self.inner.verbindung
    }

    pub fn anwesenheit(&self) -> &Anwesenheit {
        &self.inner.anwesenheit
    }
}

fn art_name(art: &UebergangsArt<'_>) -> &'static str {
    match art {
        UebergangsArt::NurBeitritt { .. } => "beitritt",
        UebergangsArt::NurAustritt { .. } => "austritt",
        UebergangsArt::Wechsel { .. } => "wechsel",
    }
}

// Alle Methoden hier laufen unter der Ordnungssperre
impl BeobachterInner {
    fn lage_erfassen<'a>(&self, art: UebergangsArt<'a>) -> Lage<'a> {
        let mut lage = Lage {
            art,
            bot_id: self.konfig.bot_id,
            verbunden: self.verbindung.ist_verbunden(),
            aktueller_kanal: self.verbindung.aktueller_kanal(),
            ziel_reserviert: false,
            ziel_auf_liste: false,
            quelle_reserviert: false,
        };
        if let Some(ziel) = lage.ziel() {
            lage.ziel_reserviert = self.zugang.ist_gesperrter_kanal(ziel.id);
            lage.ziel_auf_liste = !lage.ziel_reserviert && self.zugang.auf_liste(ziel);
        }
        if let Some(quelle) = lage.quelle() {
            lage.quelle_reserviert = self.zugang.ist_gesperrter_kanal(quelle.id);
        }
        lage
    }

    fn ausfuehren(self: &Arc<Self>, entscheidung: Entscheidung, lage: &Lage<'_>, mitglied: &Mitglied) {
        let mut umzug: Option<Kanal> = None;
        match (entscheidung.verbindung, lage.ziel()) {
            (Some(VerbindungsAktion::Verbinden), Some(ziel)) => {
                // Fehler wird in `verbinden` protokolliert
                let _ = self.verbindung.verbinden(ziel);
            }
            (Some(VerbindungsAktion::Umziehen), Some(ziel)) => {
                self.trennen_und_leeren();
                umzug = Some(ziel.clone());
            }
            (Some(_), _) => self.trennen_und_leeren(),
            (None, _) => {}
        }

        let modus = match entscheidung.warteschlange {
            Some(WarteschlangenAktion::LeerenUndBegruessen) => {
                self.wiedergabe.leeren_und_stoppen();
                Some(GrussModus::Anstellen)
            }
            Some(WarteschlangenAktion::VorziehenUndBegruessen) => Some(GrussModus::Vorziehen),
            Some(WarteschlangenAktion::Verabschieden) => {
                self.abschied_planen();
                None
            }
            None => None,
        };
        let begruessung = match (modus, lage.ziel()) {
            (Some(modus), Some(ziel)) => Some(Begruessung {
                modus,
                mitglied: mitglied.clone(),
                kanal: ziel.clone(),
            }),
            _ => None,
        };

        match umzug {
            Some(ziel) => self.wiederverbinden_planen(ziel, begruessung),
            None => {
                if let Some(b) = begruessung {
                    self.begruessung_planen(b, self.konfig.zeiten.begruessung);
                }
            }
        }
    }

    fn trennen_und_leeren(&self) {
        self.wiedergabe.leeren_und_stoppen();
        self.verbindung.trennen();
    }

    /// Verbindet nach kurzer Pause neu; eine Begruessung folgt im
    /// verbleibenden Entprellfenster auf der neuen Epoche
    fn wiederverbinden_planen(self: &Arc<Self>, ziel: Kanal, begruessung: Option<Begruessung>) {
        let zeiten = self.konfig.zeiten;
        let epoche = self.verbindung.epoche();
        let inner = Arc::clone(self);
        self.planer.planen(zeiten.wiederverbinden, epoche, move || {
            if inner.verbindung.verbinden(&ziel).is_err() {
                return;
            }
            if let Some(b) = begruessung {
                let rest = zeiten.begruessung.saturating_sub(zeiten.wiederverbinden);
                inner.begruessung_planen(b, rest);
            }
        });
    }

    fn begruessung_planen(self: &Arc<Self>, begruessung: Begruessung, verzoegerung: Duration) {
        let epoche = self.verbindung.epoche();
        let mitglied = begruessung.mitglied.id;
        let inner = Arc::clone(self);
        let aktion = self
            .planer
            .planen(verzoegerung, epoche, move || inner.begruessen(begruessung));

        let mut ausstehend = self.ausstehende_gruesse.lock();
        ausstehend.retain(|_, a| !a.ist_beendet());
        if let Some(alt) = ausstehend.insert(mitglied, aktion) {
            if !alt.ist_beendet() {
                tracing::debug!(
                    sitzung = %self.konfig.sitzung,
                    mitglied = %mitglied,
                    "Ausstehende Begruessung ersetzt"
                );
            }
            alt.abbrechen();
        }
    }

    fn begruessen(&self, b: Begruessung) {
        if !self.verbindung.ist_verbunden() {
            tracing::debug!(sitzung = %self.konfig.sitzung, "Nicht verbunden, Begruessung entfaellt");
            return;
        }
        let kanalname = self.zugang.normalisieren(&b.kanal.name);
        let mut tracks = vec![TrackAnfrage::sprache(b.mitglied.begruessungsname())];
        tracks.extend(
            self.samples
                .willkommen_waehlen(&kanalname, &mut *self.rng.lock()),
        );

        tracing::info!(
            sitzung = %self.konfig.sitzung,
            mitglied = %b.mitglied.name,
            kanal = %kanalname,
            tracks = tracks.len(),
            "Begruessung"
        );

        match b.modus {
            GrussModus::Anstellen => {
                for track in tracks {
                    self.wiedergabe.einreihen_oder_abspielen(track);
                }
            }
            GrussModus::Vorziehen => self.wiedergabe.vorziehen(tracks),
        }
    }

    fn abschied_planen(self: &Arc<Self>) {
        let epoche = self.verbindung.epoche();
        let inner = Arc::clone(self);
        self.planer
            .planen(self.konfig.zeiten.abschied, epoche, move || inner.verabschieden());
    }

    fn verabschieden(&self) {
        if !self.verbindung.ist_verbunden() {
            return;
        }
        if let Some(track) = self.samples.abschied_waehlen(&mut *self.rng.lock()) {
            tracing::info!(sitzung = %self.konfig.sitzung, kennung = %track, "Abschied");
            self.wiedergabe.einreihen_oder_abspielen(track);
        }
    }
}
