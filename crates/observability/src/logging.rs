//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Config-Datei):
//! - `GP_LOG_LEVEL`: Filter-Direktive (z.B. `info`, `geheimpost_signaling=debug`)
//! - `GP_LOG_FORMAT`: Format (text/json), Standard: text

use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Filter
pub const LOG_LEVEL_ENV: &str = "GP_LOG_LEVEL";

/// Umgebungsvariable fuer das Log-Format
pub const LOG_FORMAT_ENV: &str = "GP_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Menschenlesbar
    #[default]
    Text,
    /// Eine JSON-Zeile pro Ereignis
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unbekanntes Log-Format: {0} (erlaubt: text, json)")]
pub struct UnbekanntesFormat(String);

impl FromStr for LogFormat {
    type Err = UnbekanntesFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(UnbekanntesFormat(s.to_string())),
        }
    }
}

/// Initialisiert das Logging-System.
///
/// `level` und `format` stammen aus der Config-Datei und werden von
/// `GP_LOG_LEVEL` / `GP_LOG_FORMAT` ueberschrieben. Ein zweiter Aufruf
/// (z.B. in Tests) bleibt wirkungslos.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = format_waehlen(std::env::var(LOG_FORMAT_ENV).ok(), format);

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    if ergebnis.is_err() {
        tracing::debug!("Logging bereits initialisiert");
    }
}

/// Umgebung vor Config, ungueltige Werte fallen auf `text` zurueck
fn format_waehlen(aus_env: Option<String>, aus_config: &str) -> LogFormat {
    aus_env
        .as_deref()
        .and_then(|f| f.parse().ok())
        .or_else(|| aus_config.parse().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsen() {
        assert_eq!("text".parse(), Ok(LogFormat::Text));
        assert_eq!("json".parse(), Ok(LogFormat::Json));
        assert_eq!(" JSON ".parse(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
        assert!("".parse::<LogFormat>().is_err());
    }

    #[test]
    fn umgebung_hat_vorrang() {
        assert_eq!(format_waehlen(Some("json".into()), "text"), LogFormat::Json);
        assert_eq!(format_waehlen(None, "json"), LogFormat::Json);
    }

    #[test]
    fn ungueltiges_format_faellt_zurueck() {
        assert_eq!(format_waehlen(Some("xml".into()), "json"), LogFormat::Json);
        assert_eq!(format_waehlen(Some("xml".into()), "yaml"), LogFormat::Text);
        assert_eq!(format_waehlen(None, ""), LogFormat::Text);
    }

    #[test]
    fn doppelte_initialisierung_panikt_nicht() {
        logging_initialisieren("warn", "text");
        logging_initialisieren("debug", "json");
    }
}
