//! geheimpost-signaling – Sitzungen, Registry und TCP-Listener
//!
//! Dieser Crate verbindet Wire-Format und Kryptografie zu Sitzungen:
//! Handshake, Sende- und Empfangspfad pro Verbindung, die serverseitige
//! Client-Registry fuer Broadcasts und den TCP-Transport beider Rollen.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SitzungsServer)          verbinden() (Client)
//!     |                                      |
//!     v                                      v
//! Verbindung -- handshake() --> Sitzung -- betreiben()
//!                                  |          |
//!                                  |          +-- Empfangsschleife -> SitzungsEreignis
//!                                  |          +-- Schreib-Task (besitzt die Schreibhaelfte)
//!                                  v
//!                            SitzungsHandle::senden()  <- Shell
//!
//! ClientRegistry – Alle Sitzungen nach dem Handshake (nur Server)
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod registry;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use client::{verbinden, verbinden_mit_schluessel, ClientSitzung};
pub use connection::{Beendigung, Rolle, Sitzung, SitzungsHandle, Verbindung, VerbindungsZustand};
pub use error::{SignalingError, SignalingResult};
pub use registry::{BroadcastBericht, ClientRegistry};
pub use server_state::{ServerZustand, SignalingConfig};
pub use tcp::SitzungsServer;
