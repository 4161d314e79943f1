//! Identifikationstypen fuer Geheimpost
//!
//! Newtype-Pattern wie bei allen IDs: eine `SitzungsId` kann nicht mit
//! einer beliebigen UUID verwechselt werden.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige ID einer Verbindungs-Sitzung
///
/// Wird beim Annehmen der Transport-Verbindung vergeben, also schon vor
/// dem Handshake. Eine ID wird nie wiederverwendet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SitzungsId(pub Uuid);

impl SitzungsId {
    /// Erstellt eine neue zufaellige SitzungsId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SitzungsId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SitzungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sitzung:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sitzungs_id_eindeutig() {
        let a = SitzungsId::new();
        let b = SitzungsId::new();
        assert_ne!(a, b, "Zwei neue SitzungsIds muessen verschieden sein");
    }

    #[test]
    fn sitzungs_id_display() {
        let id = SitzungsId(Uuid::nil());
        assert_eq!(
            id.to_string(),
            "sitzung:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn sitzungs_id_ist_serde_kompatibel() {
        let id = SitzungsId::new();
        let json = serde_json::to_string(&id).unwrap();
        let id2: SitzungsId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, id2);
    }
}
