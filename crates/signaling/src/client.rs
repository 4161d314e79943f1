//! Client-Seite – Eine ausgehende Verbindung zum Server
//!
//! `verbinden` erzeugt das Client-Schluesselpaar, baut die TCP-Verbindung
//! auf, fuehrt den Handshake durch und betreibt die Sitzung in einem
//! eigenen Task. Die Shell bekommt eine `ClientSitzung` zum Senden und
//! Empfangen.

use geheimpost_core::SitzungsEreignis;
use geheimpost_crypto::SchluesselPaar;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::connection::{ereignis_melden, Beendigung, Rolle, SitzungsHandle, Verbindung};
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingConfig;

/// Laufende Client-Sitzung
pub struct ClientSitzung {
    handle: SitzungsHandle,
    ereignis_rx: mpsc::Receiver<SitzungsEreignis>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Beendigung>,
}

/// Verbindet sich mit einem Server
///
/// Die Schluesselerzeugung laeuft auf dem Blocking-Pool.
pub async fn verbinden(addr: SocketAddr, config: &SignalingConfig) -> SignalingResult<ClientSitzung> {
    let schluessel = tokio::task::spawn_blocking(SchluesselPaar::generate)
        .await
        .map_err(|e| SignalingError::intern(format!("Schluesselerzeugung abgebrochen: {e}")))??;
    verbinden_mit_schluessel(addr, config, Arc::new(schluessel)).await
}

/// Verbindet sich mit einem vorhandenen Schluesselpaar
pub async fn verbinden_mit_schluessel(
    addr: SocketAddr,
    config: &SignalingConfig,
    schluessel: Arc<SchluesselPaar>,
) -> SignalingResult<ClientSitzung> {
    let stream = TcpStream::connect(addr).await?;
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(server = %addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
    }
    tracing::info!(server = %addr, "Verbunden, starte Handshake");

    let sitzung = Verbindung::neu(stream, Rolle::Client, addr.to_string(), schluessel, config)
        .handshake()
        .await?;
    let handle = sitzung.handle();

    let (ereignis_tx, ereignis_rx) = mpsc::channel(config.ereignis_queue_groesse.max(1));
    let _ = ereignis_tx.try_send(SitzungsEreignis::HandshakeAbgeschlossen {
        sitzung: handle.id(),
        peer: handle.peer().to_string(),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let id = handle.id();
    let task = tokio::spawn(async move {
        let mut stopp_rx = shutdown_rx.clone();
        let beendigung = sitzung.betreiben(ereignis_tx.clone(), shutdown_rx).await;
        let getrennt = SitzungsEreignis::Getrennt { sitzung: id };
        ereignis_melden(&ereignis_tx, getrennt, &mut stopp_rx).await;
        beendigung
    });

    Ok(ClientSitzung {
        handle,
        ereignis_rx,
        shutdown_tx,
        task,
    })
}

impl ClientSitzung {
    pub fn handle(&self) -> &SitzungsHandle {
        &self.handle
    }

    /// Sendet einen Klartext an den Server
    pub fn senden(&self, text: &str) -> SignalingResult<()> {
        self.handle.senden(text)
    }

    /// Wartet auf das naechste Ereignis
    ///
    /// `None` wenn die Sitzung beendet ist und alle Ereignisse gelesen wurden.
    pub async fn naechstes_ereignis(&mut self) -> Option<SitzungsEreignis> {
        self.ereignis_rx.recv().await
    }

    /// Schliesst die Sitzung und wartet auf das Ende des Sitzungs-Tasks
    pub async fn trennen(self) -> Beendigung {
        let _ = self.shutdown_tx.send(true);
        match self.task.await {
            Ok(beendigung) => beendigung,
            Err(e) => {
                tracing::error!(sitzung = %self.handle.id(), fehler = %e, "Sitzungs-Task abgebrochen");
                Beendigung::Transportfehler
            }
        }
    }
}
