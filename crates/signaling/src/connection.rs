//! Verbindungs-Sitzung – Handshake und Sende-/Empfangs-Pfad
//!
//! Jede Verbindung durchlaeuft die folgende State Machine:
//!
//! ```text
//! Verbindend -> Schluesselaustausch -> Bereit -> Geschlossen
//!                      |                            ^
//!                      +------ Handshake-Fehler ----+
//! ```
//!
//! ## Handshake
//! Jede Seite sendet genau eine Zeile mit ihrem oeffentlichen Schluessel.
//! Der Server sendet zuerst, der Client antwortet erst nach Empfang.
//! Der erste empfangene Schluessel wird ohne weitere Pruefung akzeptiert
//! (trust on first use). Der gesamte Austausch ist zeitlich begrenzt.
//!
//! ## Betrieb
//! Nach dem Handshake laufen zwei Tasks:
//! - Der Schreib-Task besitzt die Schreibhaelfte allein und schreibt jede
//!   Zeile aus der Sende-Queue sofort mit Flush.
//! - Die Empfangsschleife besitzt die Lesehaelfte, oeffnet jeden Frame und
//!   meldet das Ergebnis als `SitzungsEreignis` an die Shell.
//!
//! Ein Schreibfehler beendet nur den Schreib-Task, die Empfangsschleife
//! liest weiter. Endet die Empfangsschleife, wird der Schreib-Task gestoppt
//! und der Stream freigegeben.

use futures_util::{SinkExt, StreamExt};
use geheimpost_core::{FehlerArt, SitzungsEreignis, SitzungsId};
use geheimpost_crypto::{
    export_public_key, import_public_key, open_envelope, seal_envelope,
    OeffentlicherSchluessel, SchluesselPaar,
};
use geheimpost_protocol::{Envelope, FrameCodec, HandshakeZeile, Zeile};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingConfig;

/// Zeitlimit fuer das Schliessen der Schreibhaelfte nach einem Stopp
const SCHLIESS_FRIST: Duration = Duration::from_millis(500);

/// Wartezeit auf den Schreib-Task, danach wird er abgebrochen
const SCHREIBER_FRIST: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Zustaende
// ---------------------------------------------------------------------------

/// Zustand einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Transport steht, Handshake noch nicht begonnen
    Verbindend,
    /// Schluessel werden ausgetauscht
    Schluesselaustausch,
    /// Handshake abgeschlossen, Nachrichten koennen fliessen
    Bereit,
    /// Endzustand
    Geschlossen,
}

/// Rolle im Handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rolle {
    /// Sendet den eigenen Schluessel zuerst
    Server,
    /// Antwortet nach Empfang des Server-Schluessels
    Client,
}

/// Grund fuer das Ende der Empfangsschleife
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beendigung {
    /// Gegenstelle hat den Stream geschlossen
    GegenstelleGetrennt,
    /// Lesefehler auf dem Stream
    Transportfehler,
    /// Lokales Shutdown-Signal
    LokalerShutdown,
}

// ---------------------------------------------------------------------------
// SitzungsHandle
// ---------------------------------------------------------------------------

/// Cloneable Handle auf eine Sitzung nach dem Handshake
///
/// Ueber das Handle sendet die Shell Nachrichten. Alle Klone teilen
/// denselben Zustand.
#[derive(Clone)]
pub struct SitzungsHandle {
    inner: Arc<SitzungsInner>,
}

struct SitzungsInner {
    id: SitzungsId,
    peer: String,
    schluessel: Arc<SchluesselPaar>,
    peer_schluessel: OeffentlicherSchluessel,
    sende_tx: mpsc::Sender<String>,
    zustand: RwLock<VerbindungsZustand>,
}

impl SitzungsHandle {
    pub(crate) fn neu(
        id: SitzungsId,
        peer: String,
        schluessel: Arc<SchluesselPaar>,
        peer_schluessel: OeffentlicherSchluessel,
        sende_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            inner: Arc::new(SitzungsInner {
                id,
                peer,
                schluessel,
                peer_schluessel,
                sende_tx,
                zustand: RwLock::new(VerbindungsZustand::Bereit),
            }),
        }
    }

    pub fn id(&self) -> SitzungsId {
        self.inner.id
    }

    /// Bezeichnung der Gegenstelle (z.B. Socket-Adresse)
    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    /// Im Handshake empfangener Schluessel der Gegenstelle
    pub fn peer_schluessel(&self) -> &OeffentlicherSchluessel {
        &self.inner.peer_schluessel
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        *self.inner.zustand.read()
    }

    pub fn ist_bereit(&self) -> bool {
        self.zustand() == VerbindungsZustand::Bereit
    }

    pub(crate) fn schliessen(&self) {
        *self.inner.zustand.write() = VerbindungsZustand::Geschlossen;
    }

    /// Versiegelt einen Klartext fuer die Gegenstelle und reiht ihn ein
    ///
    /// Die Verschluesselung laeuft im Aufrufer, daher wird
    /// `NutzlastZuGross` gemeldet, bevor irgendein Byte geschrieben wird.
    ///
    /// # Fehler
    /// - `Crypto(NutzlastZuGross)` wenn der Text nicht in einen Block passt
    /// - `SendeQueueVoll` wenn der Schreib-Task nicht hinterherkommt
    /// - `VerbindungGetrennt` wenn die Sitzung geschlossen ist
    pub fn senden(&self, text: &str) -> SignalingResult<()> {
        if !self.ist_bereit() {
            return Err(SignalingError::VerbindungGetrennt);
        }

        let envelope = seal_envelope(
            text.as_bytes(),
            &self.inner.schluessel,
            &self.inner.peer_schluessel,
        )?;

        match self.inner.sende_tx.try_send(envelope.to_line()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(sitzung = %self.inner.id, "Sende-Queue voll – Nachricht verworfen");
                Err(SignalingError::SendeQueueVoll)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(sitzung = %self.inner.id, "Sende-Queue geschlossen");
                Err(SignalingError::VerbindungGetrennt)
            }
        }
    }

    /// Oeffnet eine empfangene Frame-Zeile und baut das Ereignis dafuer
    ///
    /// `None` fuer fehlerhafte Frames, die uebersprungen werden.
    fn frame_oeffnen(&self, zeile: &str) -> Option<SitzungsEreignis> {
        let envelope = match Envelope::from_line(zeile) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(
                    sitzung = %self.inner.id,
                    fehler = %e,
                    "Fehlerhafter Frame uebersprungen"
                );
                return None;
            }
        };

        let ereignis = match open_envelope(
            &envelope,
            &self.inner.schluessel,
            &self.inner.peer_schluessel,
        ) {
            Ok(geoeffnet) => {
                if !geoeffnet.authentisch {
                    tracing::warn!(sitzung = %self.inner.id, "Nicht authentische Nachricht");
                }
                SitzungsEreignis::Zugestellt {
                    sitzung: self.inner.id,
                    text: geoeffnet.text(),
                    authentisch: geoeffnet.authentisch,
                }
            }
            Err(e) => {
                tracing::debug!(
                    sitzung = %self.inner.id,
                    fehler = %e,
                    "Frame nicht entschluesselbar – verworfen"
                );
                SitzungsEreignis::Fehler {
                    sitzung: self.inner.id,
                    art: e.art(),
                    detail: e.to_string(),
                }
            }
        };
        Some(ereignis)
    }
}

impl std::fmt::Debug for SitzungsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SitzungsHandle")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .field("zustand", &self.zustand())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Verbindung (vor dem Handshake)
// ---------------------------------------------------------------------------

/// Eine frisch aufgebaute Verbindung, bereit fuer den Handshake
pub struct Verbindung<S> {
    id: SitzungsId,
    peer: String,
    rolle: Rolle,
    schluessel: Arc<SchluesselPaar>,
    reader: FramedRead<ReadHalf<S>, FrameCodec>,
    writer: FramedWrite<WriteHalf<S>, FrameCodec>,
    zustand: VerbindungsZustand,
    handshake_timeout: Duration,
    sende_queue_groesse: usize,
}

impl<S> Verbindung<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Uebernimmt einen Stream und teilt ihn in Lese- und Schreibhaelfte
    pub fn neu(
        stream: S,
        rolle: Rolle,
        peer: impl Into<String>,
        schluessel: Arc<SchluesselPaar>,
        config: &SignalingConfig,
    ) -> Self {
        let (lesen, schreiben) = tokio::io::split(stream);
        Self {
            id: SitzungsId::new(),
            peer: peer.into(),
            rolle,
            schluessel,
            reader: FramedRead::new(lesen, FrameCodec::with_max_laenge(config.max_zeilen_laenge)),
            writer: FramedWrite::new(
                schreiben,
                FrameCodec::with_max_laenge(config.max_zeilen_laenge),
            ),
            zustand: VerbindungsZustand::Verbindend,
            handshake_timeout: config.handshake_timeout,
            sende_queue_groesse: config.sende_queue_groesse.max(1),
        }
    }

    pub fn id(&self) -> SitzungsId {
        self.id
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        self.zustand
    }

    /// Fuehrt den Schluesselaustausch durch
    ///
    /// Bei Fehler oder Timeout wird der Stream freigegeben und ein
    /// Handshake-Fehler zurueckgegeben. Eine fehlgeschlagene Verbindung wird
    /// nie zu einer Sitzung.
    pub async fn handshake(mut self) -> SignalingResult<Sitzung<S>> {
        self.zustand = VerbindungsZustand::Schluesselaustausch;
        tracing::debug!(sitzung = %self.id, peer = %self.peer, rolle = ?self.rolle, "Schluesselaustausch");

        let timeout = self.handshake_timeout;
        let ergebnis = match tokio::time::timeout(timeout, self.schluessel_austauschen()).await {
            Ok(ergebnis) => ergebnis,
            Err(_) => Err(SignalingError::Timeout(timeout.as_secs())),
        };

        let peer_schluessel = match ergebnis {
            Ok(peer_schluessel) => peer_schluessel,
            Err(e) => {
                self.zustand = VerbindungsZustand::Geschlossen;
                tracing::warn!(sitzung = %self.id, peer = %self.peer, fehler = %e, "Handshake fehlgeschlagen");
                return Err(e);
            }
        };

        let (sende_tx, sende_rx) = mpsc::channel(self.sende_queue_groesse);
        let handle = SitzungsHandle::neu(
            self.id,
            self.peer,
            self.schluessel,
            peer_schluessel,
            sende_tx,
        );

        tracing::info!(sitzung = %handle.id(), peer = %handle.peer(), "Handshake abgeschlossen");

        Ok(Sitzung {
            handle,
            reader: self.reader,
            writer: self.writer,
            sende_rx,
        })
    }

    async fn schluessel_austauschen(&mut self) -> SignalingResult<OeffentlicherSchluessel> {
        let der = export_public_key(self.schluessel.public_key())
            .map_err(|e| SignalingError::handshake(e.to_string()))?;
        let eigene_zeile = HandshakeZeile::new(der).to_line();

        match self.rolle {
            Rolle::Server => {
                self.zeile_senden(eigene_zeile).await?;
                self.peer_schluessel_lesen().await
            }
            Rolle::Client => {
                let peer_schluessel = self.peer_schluessel_lesen().await?;
                self.zeile_senden(eigene_zeile).await?;
                Ok(peer_schluessel)
            }
        }
    }

    async fn zeile_senden(&mut self, zeile: String) -> SignalingResult<()> {
        self.writer
            .send(zeile)
            .await
            .map_err(|e| SignalingError::handshake(format!("Schluessel senden: {e}")))
    }

    async fn peer_schluessel_lesen(&mut self) -> SignalingResult<OeffentlicherSchluessel> {
        match self.reader.next().await {
            Some(Ok(Zeile::Text(zeile))) => {
                let handshake = HandshakeZeile::from_line(&zeile)
                    .map_err(|e| SignalingError::handshake(format!("Ungueltige Schluesselzeile: {e}")))?;
                import_public_key(&handshake.schluessel_der)
                    .map_err(|e| SignalingError::handshake(e.to_string()))
            }
            Some(Ok(Zeile::Verworfen(grund))) => Err(SignalingError::handshake(format!(
                "Schluesselzeile verworfen: {grund:?}"
            ))),
            Some(Err(e)) => Err(SignalingError::handshake(format!("Schluessel lesen: {e}"))),
            None => Err(SignalingError::handshake(
                "Verbindung waehrend des Handshakes geschlossen",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Sitzung (nach dem Handshake)
// ---------------------------------------------------------------------------

/// Verbindung im Zustand `Bereit`, noch ohne laufende Tasks
pub struct Sitzung<S> {
    handle: SitzungsHandle,
    reader: FramedRead<ReadHalf<S>, FrameCodec>,
    writer: FramedWrite<WriteHalf<S>, FrameCodec>,
    sende_rx: mpsc::Receiver<String>,
}

impl<S> Sitzung<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn handle(&self) -> SitzungsHandle {
        self.handle.clone()
    }

    /// Betreibt die Sitzung bis Stream-Ende, Lesefehler oder Shutdown
    ///
    /// Startet den Schreib-Task und fuehrt die Empfangsschleife im
    /// aufrufenden Task aus. Nach der Rueckkehr ist die Sitzung
    /// `Geschlossen` und der Stream freigegeben.
    pub async fn betreiben(
        self,
        ereignis_tx: mpsc::Sender<SitzungsEreignis>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Beendigung {
        let Sitzung {
            handle,
            mut reader,
            writer,
            sende_rx,
        } = self;

        let (stopp_tx, stopp_rx) = watch::channel(false);
        let mut schreiber = tokio::spawn(schreib_schleife(
            handle.id(),
            writer,
            sende_rx,
            stopp_rx,
            ereignis_tx.clone(),
        ));

        let beendigung = if *shutdown_rx.borrow() {
            Beendigung::LokalerShutdown
        } else {
            loop {
                tokio::select! {
                    zeile = reader.next() => {
                        match zeile {
                            Some(Ok(Zeile::Text(zeile))) => {
                                if let Some(ereignis) = handle.frame_oeffnen(&zeile) {
                                    // Eine volle Shell-Queue darf den Shutdown nicht blockieren
                                    if !ereignis_melden(&ereignis_tx, ereignis, &mut shutdown_rx).await {
                                        tracing::info!(sitzung = %handle.id(), "Shutdown-Signal – Sitzung wird geschlossen");
                                        break Beendigung::LokalerShutdown;
                                    }
                                }
                            }
                            Some(Ok(Zeile::Verworfen(grund))) => {
                                tracing::debug!(sitzung = %handle.id(), grund = ?grund, "Zeile verworfen");
                            }
                            Some(Err(e)) => {
                                tracing::warn!(sitzung = %handle.id(), fehler = %e, "Lesefehler");
                                let fehler = SitzungsEreignis::Fehler {
                                    sitzung: handle.id(),
                                    art: FehlerArt::Transport,
                                    detail: e.to_string(),
                                };
                                ereignis_melden(&ereignis_tx, fehler, &mut shutdown_rx).await;
                                break Beendigung::Transportfehler;
                            }
                            None => {
                                tracing::info!(sitzung = %handle.id(), peer = %handle.peer(), "Verbindung von Gegenstelle getrennt");
                                break Beendigung::GegenstelleGetrennt;
                            }
                        }
                    }

                    _ = stopp_abwarten(&mut shutdown_rx) => {
                        tracing::info!(sitzung = %handle.id(), "Shutdown-Signal – Sitzung wird geschlossen");
                        break Beendigung::LokalerShutdown;
                    }
                }
            }
        };

        handle.schliessen();
        let _ = stopp_tx.send(true);
        match tokio::time::timeout(SCHREIBER_FRIST, &mut schreiber).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(sitzung = %handle.id(), fehler = %e, "Schreib-Task abgebrochen");
            }
            Err(_) => {
                tracing::warn!(sitzung = %handle.id(), "Schreib-Task reagiert nicht, wird abgebrochen");
                schreiber.abort();
            }
        }

        // Lesehaelfte faellt hier, die Schreibhaelfte ist mit dem Task gefallen
        drop(reader);
        tracing::debug!(sitzung = %handle.id(), beendigung = ?beendigung, "Sitzung beendet");
        beendigung
    }
}

/// Alleiniger Besitzer der Schreibhaelfte
///
/// Ein Stopp-Signal unterbricht auch einen haengenden Schreibvorgang.
async fn schreib_schleife<W>(
    sitzung: SitzungsId,
    mut writer: FramedWrite<W, FrameCodec>,
    mut sende_rx: mpsc::Receiver<String>,
    mut stopp_rx: watch::Receiver<bool>,
    ereignis_tx: mpsc::Sender<SitzungsEreignis>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            zeile = sende_rx.recv() => {
                let Some(zeile) = zeile else { break };
                // `send` flusht nach jeder Zeile
                let ergebnis = tokio::select! {
                    ergebnis = writer.send(zeile) => ergebnis,
                    _ = stopp_abwarten(&mut stopp_rx) => break,
                };
                if let Err(e) = ergebnis {
                    tracing::warn!(sitzung = %sitzung, fehler = %e, "Senden fehlgeschlagen");
                    let fehler = SitzungsEreignis::Fehler {
                        sitzung,
                        art: FehlerArt::Transport,
                        detail: e.to_string(),
                    };
                    ereignis_melden(&ereignis_tx, fehler, &mut stopp_rx).await;
                    break;
                }
            }
            _ = stopp_abwarten(&mut stopp_rx) => break,
        }
    }

    sende_rx.close();
    match tokio::time::timeout(SCHLIESS_FRIST, writer.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(sitzung = %sitzung, fehler = %e, "Schliessen der Schreibhaelfte fehlgeschlagen");
        }
        Err(_) => {
            tracing::debug!(sitzung = %sitzung, "Gegenstelle liest nicht, Schreibhaelfte wird verworfen");
        }
    }
}

/// Wartet, bis das Signal `true` ist. Ohne Sender kehrt sie nie zurueck.
pub(crate) async fn stopp_abwarten(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Meldet ein Ereignis an die Shell, gibt bei Stopp auf
///
/// `false` heisst, das Stopp-Signal kam, bevor die Queue Platz hatte. Ein
/// geschlossener Empfaenger zaehlt als zugestellt.
pub(crate) async fn ereignis_melden(
    ereignis_tx: &mpsc::Sender<SitzungsEreignis>,
    ereignis: SitzungsEreignis,
    stopp_rx: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        biased;
        _ = ereignis_tx.send(ereignis) => true,
        _ = stopp_abwarten(stopp_rx) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
