//! geheimpost-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod shell;

use anyhow::{Context, Result};
use config::ServerConfig;
use geheimpost_core::SitzungsEreignis;
use geheimpost_crypto::SchluesselPaar;
use geheimpost_signaling::{ClientRegistry, SitzungsServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Haelt den gebundenen Server zusammen
pub struct Server {
    config: ServerConfig,
    sitzungs_server: SitzungsServer,
    ereignis_rx: mpsc::Receiver<SitzungsEreignis>,
}

impl Server {
    /// Erzeugt das Server-Schluesselpaar und bindet den Listener
    pub async fn binden(config: ServerConfig) -> Result<Self> {
        tracing::info!("Erzeuge RSA-Schluesselpaar");
        let schluessel = tokio::task::spawn_blocking(SchluesselPaar::generate)
            .await
            .context("Schluesselerzeugung abgebrochen")??;
        Self::binden_mit_schluessel(config, Arc::new(schluessel)).await
    }

    /// Bindet den Listener mit einem vorhandenen Schluesselpaar
    pub async fn binden_mit_schluessel(
        config: ServerConfig,
        schluessel: Arc<SchluesselPaar>,
    ) -> Result<Self> {
        let bind_addr = config.bind_adresse()?;
        let signaling = config.sitzung.signaling_config();
        let (ereignis_tx, ereignis_rx) = mpsc::channel(signaling.ereignis_queue_groesse.max(1));

        let sitzungs_server = SitzungsServer::binden(
            bind_addr,
            signaling,
            schluessel,
            ereignis_tx,
        )
        .await
        .with_context(|| format!("Bind auf {bind_addr} fehlgeschlagen"))?;

        Ok(Self {
            config,
            sitzungs_server,
            ereignis_rx,
        })
    }

    pub fn lokale_adresse(&self) -> SocketAddr {
        self.sitzungs_server.lokale_adresse()
    }

    /// Registry fuer Broadcasts (z.B. Operator-Eingaben)
    pub fn registry(&self) -> ClientRegistry {
        self.sitzungs_server.registry()
    }

    /// Startet Listener und Ereignis-Verarbeitung
    ///
    /// Chat-Zeilen fuer die Anzeige gehen an `chat_tx`. Laeuft bis
    /// `shutdown_rx` ein `true`-Signal empfaengt und alle Sitzungen
    /// geschlossen sind.
    pub async fn starten(
        self,
        shutdown_rx: watch::Receiver<bool>,
        chat_tx: mpsc::UnboundedSender<String>,
    ) -> Result<()> {
        let Server {
            config,
            sitzungs_server,
            ereignis_rx,
        } = self;

        tracing::info!(
            adresse = %sitzungs_server.lokale_adresse(),
            antwort_senden = config.sitzung.antwort_senden,
            "Server startet"
        );
        let _ = chat_tx.send("Server gestartet...".to_string());

        let registry = sitzungs_server.registry();
        let listener = tokio::spawn(sitzungs_server.starten(shutdown_rx));

        shell::ereignis_schleife(
            ereignis_rx,
            registry,
            config.sitzung.antwort_senden,
            chat_tx,
        )
        .await;

        listener.await.context("Listener-Task abgebrochen")??;
        tracing::info!("Server beendet");
        Ok(())
    }
}
