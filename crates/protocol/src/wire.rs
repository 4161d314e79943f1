//! Wire-Format fuer TCP-Verbindungen
//!
//! Zeilenbasiertes Protokoll: jeder Frame ist genau eine Textzeile,
//! abgeschlossen mit `\n`. Ein `\r` vor dem Zeilenende wird entfernt,
//! damit auch Gegenstellen mit CRLF-Zeilenenden verstanden werden.
//!
//! ## Frame-Format
//!
//! ```text
//! +----...----+----+
//! | UTF-8     | \n |
//! +----...----+----+
//! ```
//!
//! Die maximale Zeilenlaenge ist konfigurierbar (Standard: 64 KiB).
//! Ueberlange oder nicht dekodierbare Zeilen beenden den Stream NICHT,
//! sondern werden als `Zeile::Verworfen` gemeldet. Der Decoder springt
//! dann zum naechsten Zeilenende.

use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Zeilenlaenge (64 KiB)
pub const DEFAULT_MAX_ZEILEN_LAENGE: usize = 64 * 1024;

/// Zeilenende-Byte
const ZEILENENDE: u8 = b'\n';

// ---------------------------------------------------------------------------
// Zeile
// ---------------------------------------------------------------------------

/// Ergebnis des Decoders fuer eine einzelne Zeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zeile {
    /// Gueltige Textzeile (ohne Zeilenende)
    Text(String),
    /// Zeile wurde verworfen
    Verworfen(VerwerfGrund),
}

/// Grund fuer eine verworfene Zeile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerwerfGrund {
    /// Zeile ueberschreitet die maximale Laenge
    ZuLang,
    /// Zeile ist kein gueltiges UTF-8
    KeinUtf8,
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer zeilenbasierte TCP-Verbindungen
///
/// Implementiert `Decoder` (liefert `Zeile`) und `Encoder<String>` fuer
/// die Integration mit `FramedRead` / `FramedWrite`.
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::FramedRead;
/// use geheimpost_protocol::wire::FrameCodec;
///
/// // let (lesen, schreiben) = tokio::io::split(stream);
/// // let reader = FramedRead::new(lesen, FrameCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Zeilenlaenge in Bytes (ohne Zeilenende)
    max_zeilen_laenge: usize,
    /// Ab hier im Buffer weitersuchen (bereits gepruefte Bytes)
    naechster_index: usize,
    /// Aktuelle Zeile ist zu lang und wird bis zum Zeilenende uebersprungen
    verwerfen: bool,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_laenge(DEFAULT_MAX_ZEILEN_LAENGE)
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Zeilenlaenge
    pub fn with_max_laenge(max_zeilen_laenge: usize) -> Self {
        Self {
            max_zeilen_laenge,
            naechster_index: 0,
            verwerfen: false,
        }
    }

    /// Gibt die konfigurierte maximale Zeilenlaenge zurueck
    pub fn max_zeilen_laenge(&self) -> usize {
        self.max_zeilen_laenge
    }

    /// Wandelt die Bytes einer Zeile (ohne `\n`) in eine `Zeile` um
    fn zeile_aus_bytes(&mut self, mut bytes: BytesMut) -> Zeile {
        if std::mem::take(&mut self.verwerfen) || bytes.len() > self.max_zeilen_laenge {
            return Zeile::Verworfen(VerwerfGrund::ZuLang);
        }
        if bytes.last() == Some(&b'\r') {
            bytes.truncate(bytes.len() - 1);
        }
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Zeile::Text(text),
            Err(_) => Zeile::Verworfen(VerwerfGrund::KeinUtf8),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = Zeile;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let ende = src[self.naechster_index..]
            .iter()
            .position(|b| *b == ZEILENENDE)
            .map(|offset| self.naechster_index + offset);

        match ende {
            Some(ende) => {
                self.naechster_index = 0;
                let mut zeile = src.split_to(ende + 1);
                zeile.truncate(ende);
                Ok(Some(self.zeile_aus_bytes(zeile)))
            }
            None if src.len() > self.max_zeilen_laenge => {
                // Rest bis zum naechsten Zeilenende verwerfen
                src.clear();
                self.naechster_index = 0;
                self.verwerfen = true;
                Ok(None)
            }
            None => {
                self.naechster_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(zeile) = self.decode(src)? {
            return Ok(Some(zeile));
        }

        if src.is_empty() {
            // Eine angefangene, ueberlange Zeile wird einmal gemeldet
            if std::mem::take(&mut self.verwerfen) {
                return Ok(Some(Zeile::Verworfen(VerwerfGrund::ZuLang)));
            }
            return Ok(None);
        }

        // Letzte Zeile ohne Zeilenende
        self.naechster_index = 0;
        let rest = src.split();
        Ok(Some(self.zeile_aus_bytes(rest)))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<String> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // Ein Zeilenumbruch im Inhalt wuerde die Frame-Grenzen zerstoeren
        if item.contains(['\n', '\r']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Zeile darf keinen Zeilenumbruch enthalten",
            ));
        }

        if item.len() > self.max_zeilen_laenge {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Zeile zu lang: {} Bytes (Maximum: {} Bytes)",
                    item.len(),
                    self.max_zeilen_laenge
                ),
            ));
        }

        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(ZEILENENDE);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
