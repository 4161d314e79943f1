//! # geheimpost-crypto
//!
//! Schluesselmaterial und Secure Envelope fuer Geheimpost.
//!
//! ## Module
//! - `identity` - RSA-Schluesselpaar, Export/Import oeffentlicher Schluessel
//! - `envelope` - Versiegeln (signieren + verschluesseln) und Oeffnen
//! - `error` - Fehlertypen

pub mod envelope;
pub mod error;
pub mod identity;

// Bequeme Re-Exports
pub use envelope::{open_envelope, seal_envelope, Geoeffnet};
pub use error::{CryptoError, CryptoResult};
pub use identity::{
    export_public_key, import_public_key, OeffentlicherSchluessel, SchluesselPaar,
    SCHLUESSEL_BITS,
};
