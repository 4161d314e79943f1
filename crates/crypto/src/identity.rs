//! Sitzungs-Schluesselmaterial (RSA)
//!
//! Jede Seite erzeugt beim Start ein RSA-Schluesselpaar mit fester Groesse
//! (`SCHLUESSEL_BITS`). Dasselbe Paar wird fuer Verschluesselung
//! (PKCS#1 v1.5) und Signatur (PKCS#1 v1.5 mit SHA-256) verwendet.
//!
//! Der oeffentliche Schluessel wird als DER-kodierte SubjectPublicKeyInfo
//! ausgetauscht. Nichts davon wird persistiert.

use rand::rngs::OsRng;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};

/// Schluesselgroesse in Bit (fest)
pub const SCHLUESSEL_BITS: usize = 2048;

/// Padding-Overhead von PKCS#1 v1.5 in Bytes
const PKCS1_OVERHEAD: usize = 11;

// ---------------------------------------------------------------------------
// SchluesselPaar
// ---------------------------------------------------------------------------

/// Eigenes RSA-Schluesselpaar einer Sitzung bzw. des Server-Prozesses
///
/// Unveraenderlich nach der Erzeugung.
pub struct SchluesselPaar {
    private_key: RsaPrivateKey,
    signing_key: SigningKey<Sha256>,
    public_key: OeffentlicherSchluessel,
}

impl SchluesselPaar {
    /// Generiert ein neues Schluesselpaar mit `SCHLUESSEL_BITS` Bit
    ///
    /// Rechenintensiv. Aus async-Code ueber `spawn_blocking` aufrufen.
    pub fn generate() -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, SCHLUESSEL_BITS)
            .map_err(|e| CryptoError::SchluesselGenerierung(e.to_string()))?;
        Ok(Self::from_private_key(private_key))
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = OeffentlicherSchluessel {
            key: RsaPublicKey::from(&private_key),
        };
        let signing_key = SigningKey::<Sha256>::new(private_key.clone());
        Self {
            private_key,
            signing_key,
            public_key,
        }
    }

    /// Gibt den oeffentlichen Schluessel zurueck
    pub fn public_key(&self) -> &OeffentlicherSchluessel {
        &self.public_key
    }

    /// Signiert Daten mit dem privaten Schluessel
    pub fn sign(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let signature = self
            .signing_key
            .try_sign_with_rng(&mut OsRng, data)
            .map_err(|e| CryptoError::Signierung(e.to_string()))?;
        Ok(signature.to_vec())
    }

    /// Entschluesselt ein an diesen Schluessel gerichtetes Chiffrat
    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.private_key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|e| CryptoError::Entschluesselung(e.to_string()))
    }
}

impl std::fmt::Debug for SchluesselPaar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SchluesselPaar {{ private_key: [REDACTED], bits: {} }}",
            self.public_key.bits()
        )
    }
}

// ---------------------------------------------------------------------------
// OeffentlicherSchluessel
// ---------------------------------------------------------------------------

/// Oeffentlicher RSA-Schluessel (eigener oder der der Gegenstelle)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OeffentlicherSchluessel {
    key: RsaPublicKey,
}

impl OeffentlicherSchluessel {
    /// Schluesselgroesse in Bit
    pub fn bits(&self) -> usize {
        self.key.size() * 8
    }

    /// Maximale Klartext-Laenge fuer einen einzelnen Chiffrat-Block
    pub fn max_klartext_laenge(&self) -> usize {
        self.key.size().saturating_sub(PKCS1_OVERHEAD)
    }

    /// Verschluesselt Daten fuer den Besitzer dieses Schluessels
    ///
    /// Zu lange Klartexte werden vorab mit `NutzlastZuGross` abgelehnt.
    pub fn encrypt(&self, klartext: &[u8]) -> CryptoResult<Vec<u8>> {
        let maximum = self.max_klartext_laenge();
        if klartext.len() > maximum {
            return Err(CryptoError::NutzlastZuGross {
                maximum,
                erhalten: klartext.len(),
            });
        }
        self.key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, klartext)
            .map_err(|e| CryptoError::Verschluesselung(e.to_string()))
    }

    /// Verifiziert eine Signatur ueber `data`
    ///
    /// Gibt `false` zurueck statt eines Fehlers: eine ungueltige Signatur
    /// ist ein normales Ergebnis.
    pub fn verify(&self, data: &[u8], signature_bytes: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature_bytes) else {
            return false;
        };
        let verifying_key = VerifyingKey::<Sha256>::new(self.key.clone());
        verifying_key.verify(data, &signature).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Export / Import
// ---------------------------------------------------------------------------

/// Exportiert einen oeffentlichen Schluessel als DER (SubjectPublicKeyInfo)
pub fn export_public_key(schluessel: &OeffentlicherSchluessel) -> CryptoResult<Vec<u8>> {
    schluessel
        .key
        .to_public_key_der()
        .map(|der| der.as_bytes().to_vec())
        .map_err(|e| CryptoError::SchluesselFormat(e.to_string()))
}

/// Importiert einen oeffentlichen Schluessel aus DER (SubjectPublicKeyInfo)
///
/// # Fehler
/// `SchluesselFormat` bei fehlerhaften Bytes oder fremdem Algorithmus.
pub fn import_public_key(der: &[u8]) -> CryptoResult<OeffentlicherSchluessel> {
    let key = RsaPublicKey::from_public_key_der(der)
        .map_err(|e| CryptoError::SchluesselFormat(e.to_string()))?;
    Ok(OeffentlicherSchluessel { key })
}

// ---------------------------------------------------------------------------
// Test-Schluessel
// ---------------------------------------------------------------------------

/// Einmal erzeugte Schluesselpaare fuer Tests (Generierung ist teuer)
#[cfg(test)]
pub(crate) mod test_schluessel {
    use super::SchluesselPaar;
    use std::sync::OnceLock;

    static ALICE: OnceLock<SchluesselPaar> = OnceLock::new();
    static BOB: OnceLock<SchluesselPaar> = OnceLock::new();
    static MALLORY: OnceLock<SchluesselPaar> = OnceLock::new();

    fn erzeugen() -> SchluesselPaar {
        SchluesselPaar::generate().expect("Schluesselerzeugung")
    }

    pub fn alice() -> &'static SchluesselPaar {
        ALICE.get_or_init(erzeugen)
    }

    pub fn bob() -> &'static SchluesselPaar {
        BOB.get_or_init(erzeugen)
    }

    pub fn mallory() -> &'static SchluesselPaar {
        MALLORY.get_or_init(erzeugen)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
