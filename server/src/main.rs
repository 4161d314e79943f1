//! Geheimpost Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.
//! Eingabezeilen auf stdin werden an alle Clients gesendet.

use anyhow::Result;
use geheimpost_observability::logging_initialisieren;
use geheimpost_server::{config::ServerConfig, shell, Server};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("GEHEIMPOST_CONFIG").unwrap_or_else(|_| "server.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = ServerConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Geheimpost Server wird initialisiert"
    );

    let server = Server::binden(config).await?;
    let registry = server.registry();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel::<String>();

    // Chat-Anzeige
    let anzeige = tokio::spawn(async move {
        while let Some(zeile) = chat_rx.recv().await {
            println!("[{}] {zeile}", chrono::Local::now().format("%H:%M:%S"));
        }
    });

    // Operator-Eingabe -> Broadcast
    let eingabe_chat = chat_tx.clone();
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = shell::eingabe_schleife(stdin, registry, eingabe_chat).await {
            tracing::warn!(fehler = %e, "stdin nicht lesbar");
        }
    });

    // Ctrl-C -> Shutdown
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
            Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen"),
        }
        let _ = shutdown_tx.send(true);
    });

    server.starten(shutdown_rx, chat_tx).await?;

    // Der stdin-Task haelt noch einen Sender, die Anzeige endet nicht von selbst
    anzeige.abort();
    Ok(())
}
