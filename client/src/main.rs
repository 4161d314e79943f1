//! Geheimpost Client – Einstiegspunkt
//!
//! Verbindet sich mit dem Server, sendet jede Eingabezeile verschluesselt
//! und signiert und zeigt empfangene Nachrichten an.

mod config;

use anyhow::Result;
use config::ClientConfig;
use geheimpost_core::SitzungsEreignis;
use geheimpost_observability::logging_initialisieren;
use geheimpost_signaling::verbinden;
use tokio::io::{AsyncBufReadExt, BufReader};

fn ausgeben(zeile: &str) {
    println!("[{}] {zeile}", chrono::Local::now().format("%H:%M:%S"));
}

/// Formatiert ein Ereignis fuer die Anzeige, `None` fuer stille Ereignisse
fn chat_zeile(ereignis: &SitzungsEreignis) -> Option<String> {
    match ereignis {
        SitzungsEreignis::HandshakeAbgeschlossen { .. } => {
            Some("Verbunden mit RSA-Verschluesselung und digitaler Signatur.".into())
        }
        SitzungsEreignis::Zugestellt {
            text,
            authentisch: true,
            ..
        } => Some(format!("Authentifizierter Server: {text}")),
        SitzungsEreignis::Zugestellt {
            authentisch: false, ..
        } => Some("Nicht authentische Nachricht vom Server!".into()),
        SitzungsEreignis::Fehler { art, detail, .. } => Some(format!("{art}: {detail}")),
        SitzungsEreignis::Getrennt { .. } => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad =
        std::env::var("GEHEIMPOST_CLIENT_CONFIG").unwrap_or_else(|_| "client.toml".into());
    let config = ClientConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    let adresse = config.server_adresse().await?;
    let mut sitzung = match verbinden(adresse, &config.signaling_config()).await {
        Ok(sitzung) => sitzung,
        Err(e) => {
            ausgeben(&format!("Fehler beim Verbinden: {e}"));
            return Err(e.into());
        }
    };

    let mut eingabe = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            ereignis = sitzung.naechstes_ereignis() => {
                match ereignis {
                    Some(SitzungsEreignis::Getrennt { .. }) | None => {
                        ausgeben("Verbindung zum Server getrennt.");
                        break;
                    }
                    Some(ereignis) => {
                        if let Some(zeile) = chat_zeile(&ereignis) {
                            ausgeben(&zeile);
                        }
                    }
                }
            }

            zeile = eingabe.next_line() => {
                match zeile? {
                    Some(zeile) if zeile.trim().is_empty() => continue,
                    Some(zeile) => match sitzung.senden(&zeile) {
                        Ok(()) => ausgeben(&format!("Du: {zeile}")),
                        Err(e) => ausgeben(&format!("Fehler beim Senden: {e}")),
                    },
                    // Ende der Eingabe
                    None => {
                        sitzung.trennen().await;
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
