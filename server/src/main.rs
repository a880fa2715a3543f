//! Grussbot – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Bot.

use anyhow::Result;
use grussbot_observability::logging_initialisieren;
use grussbot_server::{config::BotConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("GRUSSBOT_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = BotConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Grussbot wird initialisiert"
    );

    Server::neu(config).starten().await
}
