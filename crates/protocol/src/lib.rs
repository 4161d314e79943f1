//! geheimpost-protocol – Wire-Format des Geheimpost-Protokolls
//!
//! Zeilenbasiertes Textprotokoll:
//!
//! ```text
//! Handshake:  <base64(SPKI-DER)>\n                     (Server zuerst)
//! Nachricht:  <base64(Chiffrat)>|<base64(Signatur)>\n
//! ```

pub mod envelope;
pub mod handshake;
pub mod wire;

pub use envelope::{Envelope, FrameFehler, FELD_TRENNER};
pub use handshake::HandshakeZeile;
pub use wire::{FrameCodec, Zeile};
