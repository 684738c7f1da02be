//! Decoding of urlencoded event payloads into [`Row`]s.
//!
//! The payload format is a `&`-separated list of `key=value` pairs where keys
//! and values are percent-encoded and `+` stands for a space. A key with no
//! `=` at all carries an SQL `NULL`, whereas `key=` is the empty string.
//!
//! Decoding is a pure function of the payload so a batch that fails here can
//! be redelivered and decoded again with the same outcome.

use thiserror::Error;

use crate::row::Row;

/// Errors decoding an event payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty field name in pair {pair:?}")]
    EmptyFieldName { pair: String },

    #[error("invalid escape sequence at byte {position} of {input:?}")]
    InvalidEscape { input: String, position: usize },

    #[error("{input:?} does not decode to valid UTF-8: {reason}")]
    InvalidUtf8 { input: String, reason: String },
}

/// Decode an urlencoded `payload` into a [`Row`].
///
/// Empty pairs (as in `a=1&&b=2`) are skipped and a repeated key keeps its
/// last value.
pub fn decode_row(payload: &str) -> Result<Row, DecodeError> {
    let mut row = Row::new();

    for pair in payload.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = match pair.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (pair, None),
        };

        let key = unescape(key)?;
        if key.is_empty() {
            return Err(DecodeError::EmptyFieldName {
                pair: pair.to_string(),
            });
        }
        let value = value.map(unescape).transpose()?;

        row.insert(key, value);
    }

    Ok(row)
}

fn unescape(raw: &str) -> Result<String, DecodeError> {
    // urlencoding is lenient about stray `%`, so reject those up front
    let bytes = raw.as_bytes();
    let mut idx = 0;
    while let Some(offset) = bytes[idx..].iter().position(|b| *b == b'%') {
        let position = idx + offset;
        match bytes.get(position + 1..position + 3) {
            Some(hex) if hex.iter().all(u8::is_ascii_hexdigit) => idx = position + 3,
            _ => {
                return Err(DecodeError::InvalidEscape {
                    input: raw.to_string(),
                    position,
                });
            }
        }
    }

    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.to_string())
        .map_err(|e| DecodeError::InvalidUtf8 {
            input: raw.to_string(),
            reason: e.to_string(),
        })
}
