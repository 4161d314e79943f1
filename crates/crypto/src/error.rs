//! Fehlertypen fuer das Kryptografie-Subsystem

use geheimpost_core::FehlerArt;
use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Schluessel-Generierung fehlgeschlagen: {0}")]
    SchluesselGenerierung(String),

    #[error("Ungueltiges Schluesselformat: {0}")]
    SchluesselFormat(String),

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("Signierung fehlgeschlagen: {0}")]
    Signierung(String),

    #[error("Nutzlast zu gross: {erhalten} Bytes (Maximum: {maximum} Bytes)")]
    NutzlastZuGross { maximum: usize, erhalten: usize },
}

impl CryptoError {
    /// Bildet den Fehler auf die an die Shell gemeldete Fehlerart ab
    pub fn art(&self) -> FehlerArt {
        match self {
            Self::SchluesselFormat(_) => FehlerArt::SchluesselFormat,
            Self::Entschluesselung(_) => FehlerArt::Entschluesselung,
            Self::NutzlastZuGross { .. } => FehlerArt::NutzlastZuGross,
            // Ohne eigenes Schluesselpaar kommt keine Sitzung zustande
            Self::SchluesselGenerierung(_) => FehlerArt::Handshake,
            Self::Verschluesselung(_) | Self::Signierung(_) => FehlerArt::Intern,
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
