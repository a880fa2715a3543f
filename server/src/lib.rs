//! grussbot-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod aufloeser;
pub mod befehle;
pub mod config;
pub mod gateway;
pub mod transport;

use std::sync::Arc;

use anyhow::Result;
use grussbot_audio::{AudioAufloeser, SamplePools};
use grussbot_voice::{DateiKanalListe, SitzungsVerwaltung, SprachTransport, Zugangspruefer};
use tokio::io::BufReader;

use aufloeser::OggOpusAufloeser;
use befehle::BefehlsRegister;
use config::BotConfig;
use gateway::Gateway;
use transport::ProtokollTransport;

/// Fertig verdrahtete Komponenten
pub struct Komponenten {
    pub verwaltung: SitzungsVerwaltung,
    pub befehle: Arc<BefehlsRegister>,
}

/// Haelt den laufenden Bot-Zustand zusammen
pub struct Server {
    pub config: BotConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: BotConfig) -> Self {
        Self { config }
    }

    /// Verdrahtet Kanalliste, Samples und Sitzungs-Verwaltung
    pub fn komponenten(
        &self,
        transport: Arc<dyn SprachTransport>,
        aufloeser: Arc<dyn AudioAufloeser>,
    ) -> Result<Komponenten> {
        let samples = Arc::new(SamplePools::laden(&self.config.audio.samples)?);
        let liste = Arc::new(DateiKanalListe::neu(&self.config.kanalliste.datei));
        let zugang = Arc::new(Zugangspruefer::neu(
            liste,
            self.config.gesperrter_kanal(),
            self.config.bot.ersatz_kanalname.clone(),
        ));
        let verwaltung = SitzungsVerwaltung::neu(
            transport,
            aufloeser,
            zugang,
            samples.clone(),
            self.config.sitzungs_konfig(),
        );
        let befehle = Arc::new(BefehlsRegister::neu(
            verwaltung.clone(),
            samples,
            self.config.admins(),
        ));
        Ok(Komponenten {
            verwaltung,
            befehle,
        })
    }

    /// Startet alle Subsysteme und laeuft bis EOF auf stdin oder Ctrl-C
    ///
    /// Reihenfolge:
    /// 1. Aufloeser und Transport anlegen
    /// 2. Sitzungs-Verwaltung und Befehlsregister verdrahten
    /// 3. Leerlauf-Pruefung starten (erster Lauf sofort)
    /// 4. Gateway lesen lassen
    /// 5. Beim Ende alle Sitzungen trennen
    pub async fn starten(self) -> Result<()> {
        if self.config.bot.bot_id == 0 {
            tracing::warn!("bot.bot_id nicht gesetzt, Alleinsein im Kanal wird nicht erkannt");
        }
        tracing::info!(
            bot_id = self.config.bot.bot_id,
            kanalliste = %self.config.kanalliste.datei.display(),
            "Grussbot startet"
        );

        let aufloeser = Arc::new(OggOpusAufloeser::neu(&self.config.audio)?);
        let transport = ProtokollTransport::neu();
        let Komponenten {
            verwaltung,
            befehle,
        } = self.komponenten(transport, aufloeser)?;

        let leerlauf = verwaltung.leerlauf_pruefung_starten();
        let gateway = Gateway::neu(verwaltung.clone(), befehle);

        tracing::info!("Grussbot laeuft. Warte auf Ereignisse (stdin) oder Ctrl-C...");
        tokio::select! {
            ergebnis = gateway.laufen(BufReader::new(tokio::io::stdin()), tokio::io::stdout()) => {
                if let Err(e) = ergebnis {
                    tracing::error!(fehler = %e, "Gateway abgebrochen");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Shutdown-Signal empfangen, Grussbot wird beendet");
            }
        }

        leerlauf.abort();
        verwaltung.alle_beenden();
        Ok(())
    }
}
