//! Fehlertypen fuer den Signaling-Service

use geheimpost_core::FehlerArt;
use geheimpost_crypto::CryptoError;
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Schluesselaustausch fehlgeschlagen
    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(String),

    /// Handshake nicht rechtzeitig abgeschlossen
    #[error("Timeout nach {0} Sekunden")]
    Timeout(u64),

    /// Kryptografie-Fehler (z.B. Nutzlast zu gross)
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Sende-Queue der Sitzung ist voll
    #[error("Sende-Queue voll")]
    SendeQueueVoll,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen Handshake-Fehler
    pub fn handshake(msg: impl Into<String>) -> Self {
        Self::Handshake(msg.into())
    }

    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Bildet den Fehler auf die an die Shell gemeldete Fehlerart ab
    pub fn art(&self) -> FehlerArt {
        match self {
            Self::Io(_) | Self::VerbindungGetrennt => FehlerArt::Transport,
            Self::Handshake(_) | Self::Timeout(_) => FehlerArt::Handshake,
            Self::Crypto(e) => e.art(),
            Self::SendeQueueVoll | Self::Intern(_) => FehlerArt::Intern,
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
