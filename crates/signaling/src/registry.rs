//! Client-Registry – Alle Sitzungen nach abgeschlossenem Handshake
//!
//! Die Registry haelt die `SitzungsHandle` aller verbundenen Clients und
//! verteilt Nachrichten an sie. Jede Kopie eines Broadcasts wird einzeln
//! mit dem Schluessel des jeweiligen Empfaengers versiegelt.
//!
//! Ein fehlgeschlagenes Senden entfernt KEINE Sitzung. Sitzungen werden
//! ausschliesslich vom Verbindungs-Task nach dem Ende der Empfangsschleife
//! entfernt.

use dashmap::DashMap;
use geheimpost_core::SitzungsId;
use std::sync::Arc;

use crate::connection::SitzungsHandle;
use crate::error::{SignalingError, SignalingResult};

/// Ergebnis eines Broadcasts
#[derive(Debug, Default)]
pub struct BroadcastBericht {
    /// Anzahl erfolgreich eingereihter Kopien
    pub gesendet: usize,
    /// Sitzungen, an die nicht gesendet werden konnte
    pub fehlgeschlagen: Vec<(SitzungsId, SignalingError)>,
}

impl BroadcastBericht {
    pub fn ist_vollstaendig(&self) -> bool {
        self.fehlgeschlagen.is_empty()
    }
}

/// Zentrale Registry aller verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    sitzungen: Arc<DashMap<SitzungsId, SitzungsHandle>>,
}

impl ClientRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert eine Sitzung
    ///
    /// Gibt `false` zurueck wenn die Sitzung bereits registriert ist.
    pub fn registrieren(&self, handle: SitzungsHandle) -> bool {
        let id = handle.id();
        match self.sitzungen.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                tracing::warn!(sitzung = %id, "Sitzung bereits registriert");
                false
            }
            dashmap::mapref::entry::Entry::Vacant(eintrag) => {
                eintrag.insert(handle);
                tracing::debug!(sitzung = %id, "Sitzung registriert");
                true
            }
        }
    }

    /// Entfernt eine Sitzung (idempotent)
    ///
    /// Gibt `true` zurueck wenn die Sitzung registriert war.
    pub fn entfernen(&self, id: &SitzungsId) -> bool {
        let entfernt = self.sitzungen.remove(id).is_some();
        if entfernt {
            tracing::debug!(sitzung = %id, "Sitzung aus Registry entfernt");
        }
        entfernt
    }

    /// Sendet eine Nachricht an eine einzelne Sitzung
    pub fn an_sitzung_senden(&self, id: &SitzungsId, text: &str) -> SignalingResult<()> {
        // Handle klonen, damit waehrend der Verschluesselung kein Shard gesperrt ist
        let handle = self
            .sitzungen
            .get(id)
            .map(|eintrag| eintrag.value().clone())
            .ok_or(SignalingError::VerbindungGetrennt)?;
        handle.senden(text)
    }

    /// Sendet eine Nachricht an alle registrierten Sitzungen
    ///
    /// Ein Fehler bei einer Sitzung haelt die Zustellung an die anderen
    /// nicht auf.
    pub fn an_alle_senden(&self, text: &str) -> BroadcastBericht {
        let mut bericht = BroadcastBericht::default();
        for handle in self.handles() {
            match handle.senden(text) {
                Ok(()) => bericht.gesendet += 1,
                Err(e) => {
                    tracing::debug!(sitzung = %handle.id(), fehler = %e, "Broadcast an Sitzung fehlgeschlagen");
                    bericht.fehlgeschlagen.push((handle.id(), e));
                }
            }
        }
        bericht
    }

    /// Gibt die Anzahl der registrierten Sitzungen zurueck
    pub fn anzahl(&self) -> usize {
        self.sitzungen.len()
    }

    /// Prueft ob eine Sitzung registriert ist
    pub fn ist_registriert(&self, id: &SitzungsId) -> bool {
        self.sitzungen.contains_key(id)
    }

    /// Gibt alle registrierten Sitzungs-IDs zurueck
    pub fn sitzungs_ids(&self) -> Vec<SitzungsId> {
        self.sitzungen.iter().map(|eintrag| *eintrag.key()).collect()
    }

    fn handles(&self) -> Vec<SitzungsHandle> {
        self.sitzungen
            .iter()
            .map(|eintrag| eintrag.value().clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_hilfen::{client_schluessel, fremder_schluessel, server_schluessel};
    use geheimpost_crypto::{open_envelope, SchluesselPaar};
    use geheimpost_protocol::Envelope;
    use tokio::sync::mpsc;

    /// Sitzung ohne Transport: die Sende-Queue ist direkt lesbar
    fn test_sitzung(peer: &Arc<SchluesselPaar>) -> (SitzungsHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(4);
        let handle = SitzungsHandle::neu(
            SitzungsId::new(),
            "test".into(),
            server_schluessel(),
            peer.public_key().clone(),
            tx,
        );
        (handle, rx)
    }

    fn oeffnen(zeile: &str, empfaenger: &SchluesselPaar) -> Option<String> {
        let envelope = Envelope::from_line(zeile).unwrap();
        open_envelope(&envelope, empfaenger, server_schluessel().public_key())
            .ok()
            .filter(|g| g.authentisch)
            .map(|g| g.text())
    }

    #[test]
    fn registrieren_und_entfernen() {
        let registry = ClientRegistry::neu();
        let (handle, _rx) = test_sitzung(&client_schluessel());
        let id = handle.id();

        assert!(registry.registrieren(handle.clone()));
        assert!(registry.ist_registriert(&id));
        assert_eq!(registry.anzahl(), 1);

        // Keine Duplikate
        assert!(!registry.registrieren(handle));
        assert_eq!(registry.anzahl(), 1);

        // Entfernen ist idempotent
        assert!(registry.entfernen(&id));
        assert!(!registry.entfernen(&id));
        assert!(!registry.ist_registriert(&id));
        assert_eq!(registry.anzahl(), 0);
    }

    #[test]
    fn broadcast_einzeln_versiegelt() {
        let registry = ClientRegistry::neu();
        let a = client_schluessel();
        let b = fremder_schluessel();
        let (handle_a, mut rx_a) = test_sitzung(&a);
        let (handle_b, mut rx_b) = test_sitzung(&b);
        registry.registrieren(handle_a);
        registry.registrieren(handle_b);

        let bericht = registry.an_alle_senden("an alle");
        assert_eq!(bericht.gesendet, 2);
        assert!(bericht.ist_vollstaendig());

        let zeile_a = rx_a.try_recv().unwrap();
        let zeile_b = rx_b.try_recv().unwrap();
        assert_ne!(zeile_a, zeile_b);

        assert_eq!(oeffnen(&zeile_a, &a).as_deref(), Some("an alle"));
        assert_eq!(oeffnen(&zeile_b, &b).as_deref(), Some("an alle"));

        // A kann B's Kopie nicht lesen
        assert_ne!(oeffnen(&zeile_b, &a).as_deref(), Some("an alle"));
    }

    #[test]
    fn fehlschlag_entfernt_keine_sitzung() {
        let registry = ClientRegistry::neu();
        let (handle_a, rx_a) = test_sitzung(&client_schluessel());
        let (handle_b, mut rx_b) = test_sitzung(&fremder_schluessel());
        let id_a = handle_a.id();
        registry.registrieren(handle_a);
        registry.registrieren(handle_b);

        // Sende-Queue von A ist geschlossen (Schreib-Task weg)
        drop(rx_a);

        let bericht = registry.an_alle_senden("hallo");
        assert_eq!(bericht.gesendet, 1);
        assert_eq!(bericht.fehlgeschlagen.len(), 1);
        assert_eq!(bericht.fehlgeschlagen[0].0, id_a);
        assert!(matches!(
            bericht.fehlgeschlagen[0].1,
            SignalingError::VerbindungGetrennt
        ));

        assert!(rx_b.try_recv().is_ok());
        assert!(registry.ist_registriert(&id_a));
        assert_eq!(registry.anzahl(), 2);
    }

    #[test]
    fn an_sitzung_senden() {
        let registry = ClientRegistry::neu();
        let (handle, mut rx) = test_sitzung(&client_schluessel());
        let id = handle.id();
        registry.registrieren(handle);

        registry.an_sitzung_senden(&id, "nur du").unwrap();
        assert_eq!(
            oeffnen(&rx.try_recv().unwrap(), &client_schluessel()).as_deref(),
            Some("nur du")
        );

        let unbekannt = SitzungsId::new();
        assert!(matches!(
            registry.an_sitzung_senden(&unbekannt, "x"),
            Err(SignalingError::VerbindungGetrennt)
        ));
    }

    #[test]
    fn broadcast_ohne_sitzungen() {
        let registry = ClientRegistry::neu();
        let bericht = registry.an_alle_senden("niemand da");
        assert_eq!(bericht.gesendet, 0);
        assert!(bericht.ist_vollstaendig());
    }

    #[tokio::test]
    async fn gleichzeitiges_registrieren() {
        let registry = ClientRegistry::neu();
        let mut tasks = Vec::new();
        let mut empfaenger = Vec::new();

        for _ in 0..16 {
            let (handle, rx) = test_sitzung(&client_schluessel());
            empfaenger.push(rx);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move { registry.registrieren(handle) }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(registry.anzahl(), 16);
        assert_eq!(registry.sitzungs_ids().len(), 16);
    }
}
