//! geheimpost-core – Gemeinsame Typen, Ereignisse und Fehlerarten
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! Geheimpost-Crates und von der Anwendungs-Shell gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::FehlerArt;
pub use event::SitzungsEreignis;
pub use types::SitzungsId;
