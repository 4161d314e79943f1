//! Ende-zu-Ende-Tests: echter Server und echte Clients ueber Loopback-TCP

use geheimpost_core::{FehlerArt, SitzungsEreignis};
use geheimpost_crypto::SchluesselPaar;
use geheimpost_server::{config::ServerConfig, Server};
use geheimpost_signaling::{
    verbinden_mit_schluessel, ClientRegistry, ClientSitzung, SignalingConfig, SignalingError,
};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

static SERVER_SCHLUESSEL: OnceLock<Arc<SchluesselPaar>> = OnceLock::new();
static CLIENT_A: OnceLock<Arc<SchluesselPaar>> = OnceLock::new();
static CLIENT_B: OnceLock<Arc<SchluesselPaar>> = OnceLock::new();

fn schluessel(zelle: &'static OnceLock<Arc<SchluesselPaar>>) -> Arc<SchluesselPaar> {
    Arc::clone(zelle.get_or_init(|| Arc::new(SchluesselPaar::generate().unwrap())))
}

struct TestServer {
    adresse: SocketAddr,
    registry: ClientRegistry,
    chat_rx: mpsc::UnboundedReceiver<String>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<anyhow::Result<()>>,
}

async fn server_starten(antwort_senden: bool) -> TestServer {
    let mut config = ServerConfig::default();
    config.netzwerk.bind_adresse = "127.0.0.1".into();
    config.netzwerk.port = 0;
    config.sitzung.antwort_senden = antwort_senden;

    let server = Server::binden_mit_schluessel(config, schluessel(&SERVER_SCHLUESSEL))
        .await
        .unwrap();
    let adresse = server.lokale_adresse();
    let registry = server.registry();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (chat_tx, chat_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(server.starten(shutdown_rx, chat_tx));

    TestServer {
        adresse,
        registry,
        chat_rx,
        shutdown_tx,
        task,
    }
}

async fn client_verbinden(
    adresse: SocketAddr,
    zelle: &'static OnceLock<Arc<SchluesselPaar>>,
) -> ClientSitzung {
    let mut client = verbinden_mit_schluessel(adresse, &SignalingConfig::default(), schluessel(zelle))
        .await
        .unwrap();
    assert!(matches!(
        client.naechstes_ereignis().await,
        Some(SitzungsEreignis::HandshakeAbgeschlossen { .. })
    ));
    client
}

/// Naechste Zustellung an den Client (mit Zeitlimit)
async fn naechste_zustellung(client: &mut ClientSitzung) -> (String, bool) {
    let ereignis = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match client.naechstes_ereignis().await {
                Some(SitzungsEreignis::Zugestellt {
                    text, authentisch, ..
                }) => return (text, authentisch),
                Some(_) => continue,
                None => panic!("Sitzung beendet ohne Zustellung"),
            }
        }
    })
    .await;
    ereignis.expect("keine Zustellung innerhalb des Zeitlimits")
}

/// Wartet auf eine Chat-Zeile, die `teil` enthaelt
async fn chat_zeile_mit(server: &mut TestServer, teil: &str) -> String {
    let zeile = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let zeile = server.chat_rx.recv().await.expect("Chat-Kanal geschlossen");
            if zeile.contains(teil) {
                return zeile;
            }
        }
    })
    .await;
    zeile.unwrap_or_else(|_| panic!("keine Chat-Zeile mit '{teil}'"))
}

async fn warten_bis_registriert(registry: &ClientRegistry, anzahl: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while registry.anzahl() != anzahl {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Registry erreicht die erwartete Anzahl nicht");
}

#[tokio::test]
async fn ping_wird_beantwortet() {
    let mut server = server_starten(true).await;
    let mut client = client_verbinden(server.adresse, &CLIENT_A).await;

    client.senden("ping").unwrap();

    let zeile = chat_zeile_mit(&mut server, "Authentifizierter Client").await;
    assert!(zeile.ends_with(": ping"));

    assert_eq!(
        naechste_zustellung(&mut client).await,
        ("Server received: ping".to_string(), true)
    );
}

#[tokio::test]
async fn ohne_antwort_kommt_nichts_zurueck() {
    let mut server = server_starten(false).await;
    let mut client = client_verbinden(server.adresse, &CLIENT_A).await;

    client.senden("still").unwrap();
    chat_zeile_mit(&mut server, ": still").await;

    let nichts = tokio::time::timeout(Duration::from_millis(300), client.naechstes_ereignis()).await;
    assert!(nichts.is_err(), "es darf keine Antwort kommen");
}

#[tokio::test]
async fn broadcast_an_mehrere_clients() {
    let server = server_starten(false).await;
    let mut a = client_verbinden(server.adresse, &CLIENT_A).await;
    let mut b = client_verbinden(server.adresse, &CLIENT_B).await;
    warten_bis_registriert(&server.registry, 2).await;

    let bericht = server.registry.an_alle_senden("an alle");
    assert_eq!(bericht.gesendet, 2);

    assert_eq!(naechste_zustellung(&mut a).await, ("an alle".to_string(), true));
    assert_eq!(naechste_zustellung(&mut b).await, ("an alle".to_string(), true));
}

#[tokio::test]
async fn trennen_eines_clients_stoert_andere_nicht() {
    let server = server_starten(true).await;
    let a = client_verbinden(server.adresse, &CLIENT_A).await;
    let mut b = client_verbinden(server.adresse, &CLIENT_B).await;
    warten_bis_registriert(&server.registry, 2).await;

    a.trennen().await;
    warten_bis_registriert(&server.registry, 1).await;

    let bericht = server.registry.an_alle_senden("noch da?");
    assert_eq!(bericht.gesendet, 1);
    assert_eq!(naechste_zustellung(&mut b).await, ("noch da?".to_string(), true));

    b.senden("ja").unwrap();
    assert_eq!(
        naechste_zustellung(&mut b).await,
        ("Server received: ja".to_string(), true)
    );
}

#[tokio::test]
async fn zu_grosse_nachricht_beendet_sitzung_nicht() {
    let mut server = server_starten(true).await;
    let mut client = client_verbinden(server.adresse, &CLIENT_A).await;

    let err = client.senden(&"x".repeat(246)).unwrap_err();
    assert!(matches!(err, SignalingError::Crypto(_)));
    assert_eq!(err.art(), FehlerArt::NutzlastZuGross);

    // Passt selbst, aber die Antwort mit Praefix nicht mehr
    client.senden(&"y".repeat(240)).unwrap();
    chat_zeile_mit(&mut server, "Antwort an").await;

    client.senden("klein").unwrap();
    assert_eq!(
        naechste_zustellung(&mut client).await,
        ("Server received: klein".to_string(), true)
    );
}

#[tokio::test]
async fn shutdown_beendet_server() {
    let server = server_starten(true).await;
    let mut client = client_verbinden(server.adresse, &CLIENT_A).await;
    warten_bis_registriert(&server.registry, 1).await;

    server.shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(10), server.task)
        .await
        .expect("Server muss sich beenden")
        .unwrap()
        .unwrap();

    // Client sieht das Ende der Verbindung
    let ende = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match client.naechstes_ereignis().await {
                Some(SitzungsEreignis::Getrennt { .. }) | None => break,
                Some(_) => continue,
            }
        }
    })
    .await;
    assert!(ende.is_ok());
}
