// src/extractors/encoding.rs
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a byte buffer was turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    Strict,
    /// Undecodable bytes were dropped.
    Lossy,
}

impl fmt::Display for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeMode::Strict => f.write_str("strict"),
            DecodeMode::Lossy => f.write_str("lossy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static Encoding,
    pub mode: DecodeMode,
}

/// Resolves a WHATWG label such as `latin-1` or `utf-8`.
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Decodes filing bytes with a fixed chain: `primary` strict, then UTF-8
/// strict, then windows-1252 with undecodable bytes removed. Never fails.
pub fn decode_filing_bytes(bytes: &[u8], primary: &'static Encoding) -> DecodedText {
    decode_with_chain(bytes, &[primary, UTF_8])
}

/// Tries each encoding strictly in order, then falls back to lossy
/// windows-1252.
pub fn decode_with_chain(bytes: &[u8], chain: &[&'static Encoding]) -> DecodedText {
    for &encoding in chain {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return DecodedText { text: text.into_owned(), encoding, mode: DecodeMode::Strict };
        }
        tracing::trace!("Strict {} decode failed", encoding.name());
    }

    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    let text: String = text.chars().filter(|c| *c != char::REPLACEMENT_CHARACTER).collect();
    tracing::debug!("Falling back to lossy {} decode", WINDOWS_1252.name());
    DecodedText { text, encoding: WINDOWS_1252, mode: DecodeMode::Lossy }
}

/// `decode_filing_bytes` with the primary encoding given as a label. An
/// unknown label is skipped and the chain starts at UTF-8.
pub fn decode_with_label(bytes: &[u8], label: &str) -> DecodedText {
    let primary = encoding_for_label(label).unwrap_or_else(|| {
        tracing::warn!("Unknown encoding label {:?}, using utf-8", label);
        UTF_8
    });
    decode_filing_bytes(bytes, primary)
}
