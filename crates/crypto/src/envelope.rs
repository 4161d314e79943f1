//! Secure Envelope: signieren + verschluesseln
//!
//! ## Versiegeln
//! ```text
//! signatur = sign(absender_privat, klartext)
//! chiffrat = encrypt(empfaenger_oeffentlich, klartext)
//! ```
//!
//! Die Signatur laeuft ueber den Klartext, nicht ueber das Chiffrat.
//! Der Klartext muss in einen einzelnen RSA-Block passen
//! (`OeffentlicherSchluessel::max_klartext_laenge`), es gibt kein Chunking.
//!
//! ## Oeffnen
//! Entschluesselung mit dem eigenen privaten Schluessel, danach Pruefung der
//! Signatur mit dem oeffentlichen Schluessel des Absenders. Eine ungueltige
//! Signatur ist kein Fehler: der Klartext wird mit `authentisch == false`
//! zurueckgegeben.

use geheimpost_protocol::Envelope;

use crate::error::{CryptoError, CryptoResult};
use crate::identity::{OeffentlicherSchluessel, SchluesselPaar};

/// Ergebnis von `open_envelope`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geoeffnet {
    /// Entschluesselte Bytes
    pub klartext: Vec<u8>,
    /// Signatur des erwarteten Absenders war gueltig
    pub authentisch: bool,
}

impl Geoeffnet {
    /// Klartext als Text (ungueltiges UTF-8 wird ersetzt)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.klartext).into_owned()
    }
}

/// Versiegelt einen Klartext fuer genau einen Empfaenger
///
/// # Fehler
/// - `NutzlastZuGross` wenn der Klartext nicht in einen Block passt
///   (geprueft bevor signiert wird)
/// - `Signierung` / `Verschluesselung` bei RNG- oder Kodierungsfehlern
pub fn seal_envelope(
    klartext: &[u8],
    absender: &SchluesselPaar,
    empfaenger: &OeffentlicherSchluessel,
) -> CryptoResult<Envelope> {
    let maximum = empfaenger.max_klartext_laenge();
    if klartext.len() > maximum {
        return Err(CryptoError::NutzlastZuGross {
            maximum,
            erhalten: klartext.len(),
        });
    }

    let signature = absender.sign(klartext)?;
    let ciphertext = empfaenger.encrypt(klartext)?;

    Ok(Envelope::new(ciphertext, signature))
}

/// Oeffnet einen empfangenen Envelope
///
/// # Fehler
/// `Entschluesselung` wenn das Chiffrat nicht mit `empfaenger` passt oder
/// beschaedigt ist. Die Signaturpruefung selbst erzeugt nie einen Fehler.
pub fn open_envelope(
    envelope: &Envelope,
    empfaenger: &SchluesselPaar,
    absender: &OeffentlicherSchluessel,
) -> CryptoResult<Geoeffnet> {
    let klartext = empfaenger.decrypt(&envelope.ciphertext)?;
    let authentisch = absender.verify(&klartext, &envelope.signature);

    if !authentisch {
        tracing::debug!(bytes = klartext.len(), "Signaturpruefung fehlgeschlagen");
    }

    Ok(Geoeffnet {
        klartext,
        authentisch,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
