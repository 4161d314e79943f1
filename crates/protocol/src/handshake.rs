//! Handshake-Zeile
//!
//! Beim Verbindungsaufbau sendet jede Seite genau eine Zeile mit ihrem
//! oeffentlichen Schluessel (DER, Standard-Base64). Der Server sendet
//! zuerst, der Client antwortet erst nach Empfang.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::envelope::FrameFehler;

/// Eine Handshake-Zeile mit dem kodierten oeffentlichen Schluessel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeZeile {
    /// Oeffentlicher Schluessel als DER-Bytes
    pub schluessel_der: Vec<u8>,
}

impl HandshakeZeile {
    pub fn new(schluessel_der: Vec<u8>) -> Self {
        Self { schluessel_der }
    }

    /// Kodiert die Zeile (ohne Zeilenende)
    pub fn to_line(&self) -> String {
        STANDARD.encode(&self.schluessel_der)
    }

    /// Parst eine empfangene Handshake-Zeile
    ///
    /// Leere Zeilen werden als `FeldAnzahl(0)` abgelehnt.
    pub fn from_line(zeile: &str) -> Result<Self, FrameFehler> {
        let zeile = zeile.trim();
        if zeile.is_empty() {
            return Err(FrameFehler::FeldAnzahl(0));
        }
        Ok(Self {
            schluessel_der: STANDARD.decode(zeile)?,
        })
    }
}
