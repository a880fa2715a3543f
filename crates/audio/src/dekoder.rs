//! Dekoder-Thread
//!
//! Loest Track-Anfragen ueber den [`AudioAufloeser`] auf und schiebt die
//! Frames in einen begrenzten Puffer, aus dem der Sprach-Transport im
//! 20-ms-Takt zieht. Jeder Frame traegt die Generation des Tracks, damit
//! die Pull-Seite veraltete Frames nach einem Wechsel verwerfen kann.
//!
//! Das Ende eines Tracks wird ueber den Rueckmelde-Callback gemeldet,
//! und zwar auf dem Dekoder-Thread selbst.

use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::{select, unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, trace, warn};

use crate::error::{AudioError, AudioResult};
use crate::quelle::{AudioAufloeser, EndeGrund, FrameQuelle, FRAME_DAUER};
use crate::track::TrackAnfrage;

/// Kommandos an den Dekoder-Thread
#[derive(Debug)]
pub(crate) enum DekoderBefehl {
    Starten { anfrage: TrackAnfrage, generation: u64 },
    Stoppen { generation: u64 },
    Beenden,
}

/// Ein Frame mit der Generation seines Tracks
#[derive(Debug, Clone)]
pub(crate) struct DekoderFrame {
    pub generation: u64,
    pub daten: Bytes,
}

pub(crate) type Rueckmeldung = Box<dyn Fn(EndeGrund, u64) + Send>;

/// Handle auf den Dekoder-Thread
pub(crate) struct Dekoder {
    cmd_tx: Sender<DekoderBefehl>,
}

impl Dekoder {
    /// Startet den Dekoder-Thread
    pub fn starten(
        aufloeser: Arc<dyn AudioAufloeser>,
        frame_tx: Sender<DekoderFrame>,
        frame_rx: Receiver<DekoderFrame>,
        melden: Rueckmeldung,
    ) -> AudioResult<Self> {
        // Unbegrenzt: Senden darf unter dem Warteschlangen-Lock nie blockieren
        let (cmd_tx, cmd_rx) = unbounded::<DekoderBefehl>();

        std::thread::Builder::new()
            .name("grussbot-dekoder".to_string())
            .spawn(move || {
                dekoder_thread(cmd_rx, frame_tx, frame_rx, aufloeser, melden);
            })
            .map_err(|e| AudioError::Dekoder(e.to_string()))?;

        Ok(Self { cmd_tx })
    }

    pub fn senden(&self, befehl: DekoderBefehl) {
        if let Err(e) = self.cmd_tx.send(befehl) {
            error!("Dekoder-Kanal geschlossen: {}", e);
        }
    }
}

impl Drop for Dekoder {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(DekoderBefehl::Beenden);
        debug!("Dekoder gestoppt");
    }
}

struct LaufenderTrack {
    generation: u64,
    kennung: String,
    quelle: Box<dyn FrameQuelle>,
    /// Gelesener, aber noch nicht in den Puffer geschobener Frame
    naechster: Option<Bytes>,
}

/// Verwirft alle gepufferten Frames
fn puffer_leeren(frame_rx: &Receiver<DekoderFrame>) -> usize {
    frame_rx.try_iter().count()
}

/// Hintergrund-Thread des Dekoders
fn dekoder_thread(
    cmd_rx: Receiver<DekoderBefehl>,
    frame_tx: Sender<DekoderFrame>,
    frame_rx: Receiver<DekoderFrame>,
    aufloeser: Arc<dyn AudioAufloeser>,
    melden: Rueckmeldung,
) {
    let mut laufend: Option<LaufenderTrack> = None;
    // Quelle erschoepft, Puffer wird noch abgespielt
    let mut auslaufend: Option<u64> = None;

    debug!("Dekoder-Thread gestartet");

    loop {
        let befehl = if let Some(track) = laufend.as_mut() {
            if track.naechster.is_none() {
                match track.quelle.naechster_frame() {
                    Ok(Some(frame)) => track.naechster = Some(frame),
                    Ok(None) => {
                        trace!(kennung = %track.kennung, "Quelle erschoepft");
                        auslaufend = Some(track.generation);
                        laufend = None;
                        continue;
                    }
                    Err(e) => {
                        warn!(kennung = %track.kennung, fehler = %e, "Frame konnte nicht gelesen werden");
                        let generation = track.generation;
                        laufend = None;
                        melden(EndeGrund::LadenFehlgeschlagen, generation);
                        continue;
                    }
                }
            }

            let frame = match track.naechster.clone() {
                Some(daten) => DekoderFrame {
                    generation: track.generation,
                    daten,
                },
                None => continue,
            };

            select! {
                recv(cmd_rx) -> befehl => match befehl {
                    Ok(befehl) => befehl,
                    Err(_) => break,
                },
                send(frame_tx, frame) -> ergebnis => {
                    if ergebnis.is_err() {
                        break;
                    }
                    track.naechster = None;
                    continue;
                }
            }
        } else if let Some(generation) = auslaufend {
            match cmd_rx.recv_timeout(FRAME_DAUER) {
                Ok(befehl) => befehl,
                Err(RecvTimeoutError::Timeout) => {
                    if frame_tx.is_empty() {
                        auslaufend = None;
                        melden(EndeGrund::Fertig, generation);
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match cmd_rx.recv() {
                Ok(befehl) => befehl,
                Err(_) => break,
            }
        };

        match befehl {
            DekoderBefehl::Starten {
                anfrage,
                generation,
            } => {
                if let Some(alt) = laufend.take() {
                    melden(EndeGrund::Ersetzt, alt.generation);
                }
                auslaufend = None;
                let verworfen = puffer_leeren(&frame_rx);
                trace!(verworfen, "Frame-Puffer geleert");

                match aufloeser.aufloesen(&anfrage) {
                    Ok(quelle) => {
                        debug!(kennung = %anfrage, generation, "Track gestartet");
                        laufend = Some(LaufenderTrack {
                            generation,
                            kennung: anfrage.kennung().to_string(),
                            quelle,
                            naechster: None,
                        });
                    }
                    Err(e) => {
                        warn!(kennung = %anfrage, fehler = %e, "Track konnte nicht geladen werden");
                        melden(EndeGrund::LadenFehlgeschlagen, generation);
                    }
                }
            }
            DekoderBefehl::Stoppen { generation } => {
                laufend = None;
                auslaufend = None;
                puffer_leeren(&frame_rx);
                debug!(generation, "Track gestoppt");
                melden(EndeGrund::Gestoppt, generation);
            }
            DekoderBefehl::Beenden => break,
        }
    }

    debug!("Dekoder-Thread beendet");
}
