//! Ereignisse vom Kern an die Anwendungs-Shell
//!
//! Die Shell (Terminal, GUI, Tests) bekommt alle Ergebnisse einer Sitzung
//! als `SitzungsEreignis` ueber einen tokio-Kanal. Die Gegenrichtung
//! (Shell -> Kern) ist `SitzungsHandle::senden` im Signaling-Crate.

use serde::{Deserialize, Serialize};

use crate::error::FehlerArt;
use crate::types::SitzungsId;

/// Alle Ereignisse, die eine Sitzung an die Shell meldet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum SitzungsEreignis {
    /// Schluesselaustausch abgeschlossen, Sitzung ist bereit
    HandshakeAbgeschlossen { sitzung: SitzungsId, peer: String },

    /// Nachricht empfangen und entschluesselt
    ///
    /// `authentisch == false` heisst: die Signatur passt nicht zum
    /// Klartext. Die Shell muss das getrennt von echten Nachrichten anzeigen.
    Zugestellt {
        sitzung: SitzungsId,
        text: String,
        authentisch: bool,
    },

    /// Fehler in einer Sitzung
    Fehler {
        sitzung: SitzungsId,
        art: FehlerArt,
        detail: String,
    },

    /// Sitzung ist geschlossen
    Getrennt { sitzung: SitzungsId },
}

impl SitzungsEreignis {
    /// Gibt die Sitzung zurueck, aus der das Ereignis stammt
    pub fn sitzung(&self) -> SitzungsId {
        match self {
            Self::HandshakeAbgeschlossen { sitzung, .. }
            | Self::Zugestellt { sitzung, .. }
            | Self::Fehler { sitzung, .. }
            | Self::Getrennt { sitzung } => *sitzung,
        }
    }
}
