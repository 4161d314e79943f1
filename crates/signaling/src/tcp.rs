//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SitzungsServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task. Dieser Task fuehrt den
//! Handshake durch, registriert die Sitzung, betreibt sie bis zum Ende und
//! entfernt sie wieder aus der Registry.
//!
//! Fehler einer Verbindung bleiben in ihrem Task. Weder die Accept-Loop
//! noch andere Sitzungen sind davon betroffen.

use geheimpost_core::{FehlerArt, SitzungsEreignis};
use geheimpost_crypto::SchluesselPaar;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

use crate::connection::{ereignis_melden, stopp_abwarten, Rolle, Verbindung};
use crate::registry::ClientRegistry;
use crate::server_state::{ServerZustand, SignalingConfig, VerbindungsPlatz};

/// TCP-Server fuer Geheimpost-Sitzungen
pub struct SitzungsServer {
    zustand: Arc<ServerZustand>,
    listener: TcpListener,
    lokale_adresse: SocketAddr,
}

impl SitzungsServer {
    /// Bindet den Listener
    ///
    /// Port 0 waehlt einen freien Port, siehe `lokale_adresse`.
    pub async fn binden(
        bind_addr: SocketAddr,
        config: SignalingConfig,
        schluessel: Arc<SchluesselPaar>,
        ereignis_tx: mpsc::Sender<SitzungsEreignis>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        let lokale_adresse = listener.local_addr()?;
        Ok(Self {
            zustand: ServerZustand::neu(config, schluessel, ereignis_tx),
            listener,
            lokale_adresse,
        })
    }

    pub fn lokale_adresse(&self) -> SocketAddr {
        self.lokale_adresse
    }

    /// Registry der verbundenen Clients (fuer Broadcasts der Shell)
    pub fn registry(&self) -> ClientRegistry {
        self.zustand.registry.clone()
    }

    /// Startet die Accept-Loop
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt. Laufende
    /// Sitzungen bekommen dasselbe Signal und schliessen sich selbst.
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        tracing::info!(
            adresse = %self.lokale_adresse,
            max_clients = self.zustand.config.max_clients,
            "TCP-Server gestartet"
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let Some(platz) = self.zustand.platz_reservieren() else {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.zustand.config.max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            };

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");
                            tokio::spawn(verbindung_bearbeiten(
                                Arc::clone(&self.zustand),
                                stream,
                                peer_addr,
                                shutdown_rx.clone(),
                                platz,
                            ));
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("TCP-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            offen = self.zustand.aktive_verbindungen(),
            "TCP-Server gestoppt"
        );
        Ok(())
    }
}

/// Lebenszyklus einer einzelnen Server-Verbindung
async fn verbindung_bearbeiten(
    zustand: Arc<ServerZustand>,
    stream: TcpStream,
    peer_addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
    _platz: VerbindungsPlatz,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
    }

    let verbindung = Verbindung::neu(
        stream,
        Rolle::Server,
        peer_addr.to_string(),
        Arc::clone(&zustand.schluessel),
        &zustand.config,
    );
    let id = verbindung.id();

    let ergebnis = tokio::select! {
        ergebnis = verbindung.handshake() => ergebnis,
        _ = stopp_abwarten(&mut shutdown_rx) => {
            tracing::debug!(peer = %peer_addr, "Shutdown waehrend des Handshakes");
            return;
        }
    };
    let sitzung = match ergebnis {
        Ok(sitzung) => sitzung,
        Err(e) => {
            let fehler = SitzungsEreignis::Fehler {
                sitzung: id,
                art: FehlerArt::Handshake,
                detail: e.to_string(),
            };
            ereignis_melden(&zustand.ereignis_tx, fehler, &mut shutdown_rx).await;
            return;
        }
    };

    let handle = sitzung.handle();
    zustand.registry.registrieren(handle.clone());
    tracing::debug!(
        sitzung = %id,
        aktiv = zustand.aktive_verbindungen(),
        registriert = zustand.registry.anzahl(),
        "Sitzung registriert"
    );
    let bereit = SitzungsEreignis::HandshakeAbgeschlossen {
        sitzung: id,
        peer: handle.peer().to_string(),
    };
    ereignis_melden(&zustand.ereignis_tx, bereit, &mut shutdown_rx).await;

    let beendigung = sitzung
        .betreiben(zustand.ereignis_tx.clone(), shutdown_rx.clone())
        .await;

    zustand.registry.entfernen(&id);
    let getrennt = SitzungsEreignis::Getrennt { sitzung: id };
    ereignis_melden(&zustand.ereignis_tx, getrennt, &mut shutdown_rx).await;

    tracing::info!(
        sitzung = %id,
        peer = %peer_addr,
        beendigung = ?beendigung,
        "Verbindungs-Task beendet"
    );
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::verbinden_mit_schluessel;
    use crate::test_hilfen::{client_schluessel, fremder_schluessel, server_schluessel};

    async fn test_server(
        config: SignalingConfig,
    ) -> (
        SocketAddr,
        ClientRegistry,
        mpsc::Receiver<SitzungsEreignis>,
        watch::Sender<bool>,
    ) {
        let (ereignis_tx, ereignis_rx) = mpsc::channel(64);
        let server = SitzungsServer::binden(
            "127.0.0.1:0".parse().unwrap(),
            config,
            server_schluessel(),
            ereignis_tx,
        )
        .await
        .unwrap();
        let adresse = server.lokale_adresse();
        let registry = server.registry();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(server.starten(shutdown_rx));
        (adresse, registry, ereignis_rx, shutdown_tx)
    }

    #[tokio::test]
    async fn client_wird_registriert_und_entfernt() {
        let (adresse, registry, mut ereignisse, _shutdown) =
            test_server(SignalingConfig::default()).await;

        let client = verbinden_mit_schluessel(adresse, &SignalingConfig::default(), client_schluessel())
            .await
            .unwrap();

        let id = match ereignisse.recv().await.unwrap() {
            SitzungsEreignis::HandshakeAbgeschlossen { sitzung, .. } => sitzung,
            other => panic!("Handshake erwartet, erhalten: {other:?}"),
        };
        assert!(registry.ist_registriert(&id));

        client.trennen().await;
        assert_eq!(
            ereignisse.recv().await.unwrap(),
            SitzungsEreignis::Getrennt { sitzung: id }
        );
        assert!(!registry.ist_registriert(&id));
    }

    #[tokio::test]
    async fn server_voll_lehnt_verbindung_ab() {
        let config = SignalingConfig {
            max_clients: 1,
            ..Default::default()
        };
        let (adresse, registry, mut ereignisse, _shutdown) = test_server(config.clone()).await;

        let _erster = verbinden_mit_schluessel(adresse, &config, client_schluessel())
            .await
            .unwrap();
        assert!(matches!(
            ereignisse.recv().await.unwrap(),
            SitzungsEreignis::HandshakeAbgeschlossen { .. }
        ));

        let zweiter = verbinden_mit_schluessel(adresse, &config, fremder_schluessel()).await;
        let err = zweiter.err().expect("zweiter Client muss abgelehnt werden");
        assert_eq!(err.art(), FehlerArt::Handshake);
        assert_eq!(registry.anzahl(), 1);
    }

    #[tokio::test]
    async fn ungueltiger_handshake_wird_gemeldet() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let (adresse, registry, mut ereignisse, _shutdown) =
            test_server(SignalingConfig::default()).await;

        let stream = TcpStream::connect(adresse).await.unwrap();
        let (lesen, mut schreiben) = stream.into_split();
        let mut zeilen = BufReader::new(lesen).lines();
        let _server_schluessel = zeilen.next_line().await.unwrap();
        schreiben.write_all(b"kein schluessel\n").await.unwrap();

        match ereignisse.recv().await.unwrap() {
            SitzungsEreignis::Fehler { art, .. } => assert_eq!(art, FehlerArt::Handshake),
            other => panic!("Handshake-Fehler erwartet, erhalten: {other:?}"),
        }
        assert_eq!(registry.anzahl(), 0);

        // Server hat die Verbindung geschlossen
        assert!(zeilen.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn shutdown_beendet_sitzungen() {
        let (adresse, registry, mut ereignisse, shutdown_tx) =
            test_server(SignalingConfig::default()).await;

        let mut client = verbinden_mit_schluessel(adresse, &SignalingConfig::default(), client_schluessel())
            .await
            .unwrap();
        assert!(matches!(
            ereignisse.recv().await.unwrap(),
            SitzungsEreignis::HandshakeAbgeschlossen { .. }
        ));

        shutdown_tx.send(true).unwrap();

        assert!(matches!(
            ereignisse.recv().await.unwrap(),
            SitzungsEreignis::Getrennt { .. }
        ));
        assert_eq!(registry.anzahl(), 0);

        // Client sieht das Stream-Ende
        loop {
            match client.naechstes_ereignis().await {
                Some(SitzungsEreignis::Getrennt { .. }) | None => break,
                Some(_) => continue,
            }
        }
    }

    #[tokio::test]
    async fn shutdown_bricht_laufenden_handshake_ab() {
        use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

        let config = SignalingConfig {
            handshake_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let (adresse, registry, _ereignisse, shutdown_tx) = test_server(config).await;

        // Server-Schluessel lesen, aber nie antworten
        let mut stream = BufReader::new(TcpStream::connect(adresse).await.unwrap());
        let mut zeile = String::new();
        stream.read_line(&mut zeile).await.unwrap();
        assert!(!zeile.trim().is_empty());

        shutdown_tx.send(true).unwrap();

        let mut rest = Vec::new();
        let ende = tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut rest)).await;
        assert!(ende.is_ok(), "Verbindung muss vor dem Handshake-Timeout schliessen");
        assert_eq!(registry.anzahl(), 0);
    }
}
