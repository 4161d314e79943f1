//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use geheimpost_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Sitzungs-Einstellungen
    pub sitzung: SitzungsEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse (Standard: alle Interfaces)
    pub bind_adresse: String,
    /// TCP-Port
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 9000,
        }
    }
}

/// Sitzungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungsEinstellungen {
    /// Maximale Anzahl gleichzeitiger Clients
    pub max_clients: usize,
    /// Zeit fuer den Schluesselaustausch in Sekunden
    pub handshake_timeout_sek: u64,
    /// Maximale Zeilenlaenge in Bytes
    pub max_zeilen_laenge: usize,
    /// Sende-Queue pro Client
    pub sende_queue_groesse: usize,
    /// Authentische Nachrichten mit "Server received: ..." beantworten
    pub antwort_senden: bool,
}

impl Default for SitzungsEinstellungen {
    fn default() -> Self {
        let basis = SignalingConfig::default();
        Self {
            max_clients: basis.max_clients,
            handshake_timeout_sek: basis.handshake_timeout.as_secs(),
            max_zeilen_laenge: basis.max_zeilen_laenge,
            sende_queue_groesse: basis.sende_queue_groesse,
            antwort_senden: true,
        }
    }
}

impl SitzungsEinstellungen {
    /// Uebersetzt die Datei-Einstellungen in die Signaling-Konfiguration
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_clients: self.max_clients,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_sek),
            max_zeilen_laenge: self.max_zeilen_laenge,
            sende_queue_groesse: self.sende_queue_groesse,
            ..SignalingConfig::default()
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let adresse = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port);
        adresse
            .parse()
            .map_err(|e| anyhow::anyhow!("Ungueltige Bind-Adresse '{adresse}': {e}"))
    }
}
