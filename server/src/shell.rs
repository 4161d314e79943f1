//! Terminal-Shell des Servers
//!
//! Zwei Schleifen verbinden den Kern mit dem Operator:
//! - `ereignis_schleife` stellt Sitzungs-Ereignisse als Chat-Zeilen dar und
//!   beantwortet authentische Nachrichten mit `"Server received: " + text`.
//! - `eingabe_schleife` sendet jede Eingabezeile des Operators als
//!   Broadcast an alle verbundenen Clients.

use geheimpost_core::SitzungsEreignis;
use geheimpost_signaling::ClientRegistry;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Praefix der automatischen Antwort
pub const ANTWORT_PRAEFIX: &str = "Server received: ";

/// Formatiert ein Ereignis als Chat-Zeile (ohne Zeitstempel)
pub fn chat_zeile(ereignis: &SitzungsEreignis) -> String {
    match ereignis {
        SitzungsEreignis::HandshakeAbgeschlossen { sitzung, peer } => {
            format!("Client verbunden: {peer} ({sitzung})")
        }
        SitzungsEreignis::Zugestellt {
            sitzung,
            text,
            authentisch: true,
        } => format!("Authentifizierter Client {sitzung}: {text}"),
        SitzungsEreignis::Zugestellt {
            sitzung,
            authentisch: false,
            ..
        } => format!("Nicht authentische Nachricht von Client {sitzung}!"),
        SitzungsEreignis::Fehler {
            sitzung,
            art,
            detail,
        } => format!("{art} bei {sitzung}: {detail}"),
        SitzungsEreignis::Getrennt { sitzung } => format!("Client getrennt: {sitzung}"),
    }
}

/// Verarbeitet Sitzungs-Ereignisse bis alle Sender geschlossen sind
pub async fn ereignis_schleife(
    mut ereignis_rx: mpsc::Receiver<SitzungsEreignis>,
    registry: ClientRegistry,
    antwort_senden: bool,
    chat_tx: mpsc::UnboundedSender<String>,
) {
    while let Some(ereignis) = ereignis_rx.recv().await {
        tracing::debug!(sitzung = %ereignis.sitzung(), "Ereignis empfangen");
        let _ = chat_tx.send(chat_zeile(&ereignis));

        if let SitzungsEreignis::Zugestellt {
            sitzung,
            text,
            authentisch: true,
        } = &ereignis
        {
            if !antwort_senden {
                continue;
            }
            let antwort = format!("{ANTWORT_PRAEFIX}{text}");
            if let Err(e) = registry.an_sitzung_senden(sitzung, &antwort) {
                tracing::warn!(sitzung = %sitzung, fehler = %e, "Antwort nicht gesendet");
                let _ = chat_tx.send(format!("Antwort an {sitzung} fehlgeschlagen: {e}"));
            }
        }
    }
    tracing::debug!("Ereignis-Schleife beendet");
}

/// Liest Operator-Zeilen und sendet sie an alle Clients
///
/// Leere Zeilen und Zeilen nur aus Leerzeichen werden ignoriert. Endet mit
/// dem Ende der Eingabe.
pub async fn eingabe_schleife<R>(
    eingabe: R,
    registry: ClientRegistry,
    chat_tx: mpsc::UnboundedSender<String>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut zeilen = eingabe.lines();
    while let Some(zeile) = zeilen.next_line().await? {
        if zeile.trim().is_empty() {
            continue;
        }

        let bericht = registry.an_alle_senden(&zeile);
        tracing::debug!(gesendet = bericht.gesendet, "Broadcast");
        let _ = chat_tx.send(format!("Server: {zeile}"));
        for (sitzung, fehler) in &bericht.fehlgeschlagen {
            let _ = chat_tx.send(format!("Senden an {sitzung} fehlgeschlagen: {fehler}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geheimpost_core::{FehlerArt, SitzungsId};

    #[test]
    fn chat_zeilen() {
        let sitzung = SitzungsId::new();

        let echt = SitzungsEreignis::Zugestellt {
            sitzung,
            text: "hallo".into(),
            authentisch: true,
        };
        assert_eq!(
            chat_zeile(&echt),
            format!("Authentifizierter Client {sitzung}: hallo")
        );

        // Text einer nicht authentischen Nachricht wird nicht angezeigt
        let gefaelscht = SitzungsEreignis::Zugestellt {
            sitzung,
            text: "geheim".into(),
            authentisch: false,
        };
        let zeile = chat_zeile(&gefaelscht);
        assert!(zeile.starts_with("Nicht authentische Nachricht"));
        assert!(!zeile.contains("geheim"));

        let fehler = SitzungsEreignis::Fehler {
            sitzung,
            art: FehlerArt::Entschluesselung,
            detail: "kaputt".into(),
        };
        assert!(chat_zeile(&fehler).starts_with("Entschluesselungs-Fehler"));
    }

    #[tokio::test]
    async fn leere_eingabezeilen_werden_ignoriert() {
        let registry = ClientRegistry::neu();
        let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();

        let eingabe: &[u8] = b"\n   \nhallo\n\t\n";
        eingabe_schleife(eingabe, registry, chat_tx).await.unwrap();

        assert_eq!(chat_rx.recv().await.unwrap(), "Server: hallo");
        assert!(chat_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn ereignis_schleife_endet_mit_den_sendern() {
        let (ereignis_tx, ereignis_rx) = mpsc::channel(4);
        let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
        let sitzung = SitzungsId::new();

        ereignis_tx
            .send(SitzungsEreignis::Getrennt { sitzung })
            .await
            .unwrap();
        drop(ereignis_tx);

        ereignis_schleife(ereignis_rx, ClientRegistry::neu(), true, chat_tx).await;
        assert_eq!(
            chat_rx.recv().await.unwrap(),
            format!("Client getrennt: {sitzung}")
        );
    }
}
