//! Client-Konfiguration (TOML, alle Felder optional)

use geheimpost_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub verbindung: VerbindungsEinstellungen,
    pub sitzung: SitzungsEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// Ziel-Server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    pub host: String,
    pub port: u16,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungsEinstellungen {
    pub handshake_timeout_sek: u64,
    pub max_zeilen_laenge: usize,
    pub sende_queue_groesse: usize,
}

impl Default for SitzungsEinstellungen {
    fn default() -> Self {
        let basis = SignalingConfig::default();
        Self {
            handshake_timeout_sek: basis.handshake_timeout.as_secs(),
            max_zeilen_laenge: basis.max_zeilen_laenge,
            sende_queue_groesse: basis.sende_queue_groesse,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    pub level: String,
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        // Das Terminal gehoert dem Chat, daher standardmaessig nur Warnungen
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration, fehlende Datei ergibt Standardwerte
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(pfad = pfad, "Konfigurationsdatei nicht gefunden, verwende Standardwerte");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("Konfigurationsdatei '{pfad}' nicht lesbar: {e}")),
        }
    }

    /// Loest Host und Port zu einer Socket-Adresse auf
    pub async fn server_adresse(&self) -> anyhow::Result<SocketAddr> {
        let ziel = format!("{}:{}", self.verbindung.host, self.verbindung.port);
        let mut adressen = match tokio::net::lookup_host(ziel.as_str()).await {
            Ok(adressen) => adressen,
            Err(e) => anyhow::bail!("'{ziel}' nicht aufloesbar: {e}"),
        };
        adressen
            .next()
            .ok_or_else(|| anyhow::anyhow!("'{ziel}' hat keine Adresse"))
    }

    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            handshake_timeout: Duration::from_secs(self.sitzung.handshake_timeout_sek),
            max_zeilen_laenge: self.sitzung.max_zeilen_laenge,
            sende_queue_groesse: self.sitzung.sende_queue_groesse,
            ..SignalingConfig::default()
        }
    }
}
