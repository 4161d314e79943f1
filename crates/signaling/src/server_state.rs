//! Konfiguration und gemeinsamer Server-Zustand
//!
//! `SignalingConfig` gilt fuer beide Rollen (Server und Client).
//! `ServerZustand` haelt alles, was sich die Verbindungs-Tasks des Servers
//! teilen, als Arc-Referenz.

use geheimpost_core::SitzungsEreignis;
use geheimpost_crypto::SchluesselPaar;
use geheimpost_protocol::wire::DEFAULT_MAX_ZEILEN_LAENGE;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::registry::ClientRegistry;

/// Konfiguration fuer Sitzungen und Listener
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige Verbindungen (inkl. laufender Handshakes)
    pub max_clients: usize,
    /// Zeit fuer den kompletten Schluesselaustausch
    pub handshake_timeout: Duration,
    /// Maximale Laenge einer Zeile in Bytes
    pub max_zeilen_laenge: usize,
    /// Groesse der Sende-Queue pro Sitzung
    pub sende_queue_groesse: usize,
    /// Groesse der Ereignis-Queue zur Shell
    pub ereignis_queue_groesse: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            handshake_timeout: Duration::from_secs(10),
            max_zeilen_laenge: DEFAULT_MAX_ZEILEN_LAENGE,
            sende_queue_groesse: 64,
            ereignis_queue_groesse: 256,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct ServerZustand {
    /// Konfiguration
    pub config: SignalingConfig,
    /// Schluesselpaar des Server-Prozesses (einmal pro Prozess erzeugt)
    pub schluessel: Arc<SchluesselPaar>,
    /// Registrierte Sitzungen nach abgeschlossenem Handshake
    pub registry: ClientRegistry,
    /// Ereignisse an die Shell
    pub ereignis_tx: mpsc::Sender<SitzungsEreignis>,
    /// Offene Verbindungen (auch solche im Handshake)
    aktive_verbindungen: AtomicUsize,
}

impl ServerZustand {
    pub fn neu(
        config: SignalingConfig,
        schluessel: Arc<SchluesselPaar>,
        ereignis_tx: mpsc::Sender<SitzungsEreignis>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            schluessel,
            registry: ClientRegistry::neu(),
            ereignis_tx,
            aktive_verbindungen: AtomicUsize::new(0),
        })
    }

    /// Reserviert einen Verbindungsplatz, `None` wenn der Server voll ist
    ///
    /// Der Platz wird freigegeben, sobald der zurueckgegebene Guard faellt.
    pub fn platz_reservieren(self: &Arc<Self>) -> Option<VerbindungsPlatz> {
        let max = self.config.max_clients;
        self.aktive_verbindungen
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |aktiv| {
                (aktiv < max).then_some(aktiv + 1)
            })
            .ok()?;
        Some(VerbindungsPlatz {
            zustand: Arc::clone(self),
        })
    }

    /// Anzahl offener Verbindungen
    pub fn aktive_verbindungen(&self) -> usize {
        self.aktive_verbindungen.load(Ordering::Acquire)
    }
}

/// Belegter Verbindungsplatz (RAII)
pub struct VerbindungsPlatz {
    zustand: Arc<ServerZustand>,
}

impl Drop for VerbindungsPlatz {
    fn drop(&mut self) {
        self.zustand
            .aktive_verbindungen
            .fetch_sub(1, Ordering::AcqRel);
    }
}
