//! Text-Darstellung eines Anwendungs-Frames
//!
//! Ein `Envelope` besteht aus Chiffrat und abgetrennter Signatur. Auf der
//! Leitung werden beide Felder base64-kodiert und mit `|` verbunden:
//!
//! ```text
//! <base64(Chiffrat)>|<base64(Signatur)>
//! ```
//!
//! `|` kommt im Standard-Base64-Alphabet nicht vor, daher ist die Trennung
//! eindeutig. Eine Zeile mit mehr oder weniger als einem Trenner ist ein
//! fehlerhafter Frame und wird vom Empfaenger uebersprungen.

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

/// Trennzeichen zwischen Chiffrat und Signatur
pub const FELD_TRENNER: char = '|';

/// Fehler beim Parsen einer Frame-Zeile
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameFehler {
    /// Zeile hat nicht genau zwei Felder
    #[error("Falsche Feldanzahl: erwartet 2, erhalten {0}")]
    FeldAnzahl(usize),

    /// Feld ist kein gueltiges Base64
    #[error("Base64-Dekodierung fehlgeschlagen: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Wire-Einheit: Chiffrat plus Signatur ueber den Original-Klartext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Mit dem oeffentlichen Schluessel des Empfaengers verschluesselt
    pub ciphertext: Vec<u8>,
    /// Signatur des Absenders ueber den Klartext
    pub signature: Vec<u8>,
}

impl Envelope {
    pub fn new(ciphertext: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            ciphertext,
            signature,
        }
    }

    /// Kodiert den Envelope als Frame-Zeile (ohne Zeilenende)
    pub fn to_line(&self) -> String {
        format!(
            "{}{}{}",
            STANDARD.encode(&self.ciphertext),
            FELD_TRENNER,
            STANDARD.encode(&self.signature)
        )
    }

    /// Parst eine Frame-Zeile
    ///
    /// # Fehler
    /// - `FeldAnzahl` wenn die Zeile nicht genau einen Trenner enthaelt
    /// - `Base64` wenn eines der Felder nicht dekodierbar ist
    pub fn from_line(zeile: &str) -> Result<Self, FrameFehler> {
        let felder: Vec<&str> = zeile.split(FELD_TRENNER).collect();
        let [chiffrat, signatur] = felder.as_slice() else {
            return Err(FrameFehler::FeldAnzahl(felder.len()));
        };

        Ok(Self {
            ciphertext: STANDARD.decode(chiffrat)?,
            signature: STANDARD.decode(signatur)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
