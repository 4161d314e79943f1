//! Fehlerarten fuer Geheimpost
//!
//! `FehlerArt` ist die Taxonomie, mit der Fehler an die Shell gemeldet
//! werden. Die einzelnen Crates haben eigene Fehler-Enums und bilden sie
//! auf eine `FehlerArt` ab.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Art eines an die Shell gemeldeten Fehlers
///
/// Eine fehlgeschlagene Signaturpruefung ist KEIN Fehler, sondern ein
/// normales Ergebnis (`authentisch == false`) und taucht hier nicht auf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum FehlerArt {
    /// Schluesselaustausch fehlgeschlagen (fatal fuer diese Sitzung)
    #[error("Handshake-Fehler")]
    Handshake,

    /// Ungueltig kodierter Schluessel (fatal fuer die Operation)
    #[error("Schluesselformat-Fehler")]
    SchluesselFormat,

    /// Frame konnte nicht entschluesselt werden (Frame wird verworfen)
    #[error("Entschluesselungs-Fehler")]
    Entschluesselung,

    /// Klartext passt nicht in einen Chiffrat-Block (vor jeder I/O gemeldet)
    #[error("Nutzlast zu gross")]
    NutzlastZuGross,

    /// Stream geschlossen oder I/O-Fehler (beendet die Sitzung)
    #[error("Transport-Fehler")]
    Transport,

    /// Lokaler Fehler ausserhalb der Taxonomie (RNG, Kodierung)
    #[error("Interner Fehler")]
    Intern,
}
