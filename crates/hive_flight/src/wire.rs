//! Minimal protobuf wire scanner for Flight SQL command payloads.
//!
//! Only enough of the wire format is understood to pull the statement text
//! (field 1) out of a `CommandStatementQuery`, optionally wrapped in one or
//! more `google.protobuf.Any` envelopes. Anything the scanner cannot make
//! sense of degrades to reading the payload as plain UTF-8 text.

use thiserror::Error;
use tracing::{debug, warn};

/// Substring present in every `google.protobuf.Any` type URL.
const ANY_TYPE_URL_MARKER: &[u8] = b"type.googleapis.com";
/// `Any.value` field number.
const ANY_VALUE_FIELD_NUMBER: u64 = 2;
/// `CommandStatementQuery.query` field number.
const STATEMENT_FIELD_NUMBER: u64 = 1;

const WIRE_TYPE_VARINT: u64 = 0;
const WIRE_TYPE_LENGTH_DELIMITED: u64 = 2;
const WIRE_TYPE_MASK: u64 = 0x07;
const FIELD_NUMBER_SHIFT: u32 = 3;

/// Structural decode failures. These never escape [`decode_command`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("truncated varint at offset {0}")]
    TruncatedVarint(usize),
    #[error("varint at offset {0} overflows 64 bits")]
    VarintOverflow(usize),
    #[error("field of {len} bytes at offset {offset} runs past end of buffer")]
    TruncatedField { offset: usize, len: u64 },
    #[error("statement field is not valid UTF-8")]
    InvalidUtf8,
}

/// Extracts the SQL statement carried by a Flight command payload.
///
/// Never fails: when structured decoding finds no statement field or hits a
/// malformed buffer, the whole payload is returned as lossy UTF-8.
pub fn decode_command(payload: &[u8]) -> String {
    if contains_subslice(payload, ANY_TYPE_URL_MARKER) {
        if let Some(inner) = any_value(payload) {
            return decode_command(inner);
        }
    }

    match scan_statement(payload) {
        Ok(Some(statement)) => statement,
        Ok(None) => {
            debug!(
                payload_len = payload.len(),
                "no statement field in command payload; decoding as raw text"
            );
            String::from_utf8_lossy(payload).into_owned()
        }
        Err(err) => {
            warn!(
                error = %err,
                payload_len = payload.len(),
                "malformed command payload; decoding as raw text"
            );
            String::from_utf8_lossy(payload).into_owned()
        }
    }
}

/// Returns the bytes of the first `Any.value` field, clamped to the buffer.
fn any_value(payload: &[u8]) -> Option<&[u8]> {
    let mut idx = 0;
    while idx < payload.len() {
        let tag = read_varint(payload, &mut idx).ok()?;
        match tag & WIRE_TYPE_MASK {
            WIRE_TYPE_LENGTH_DELIMITED => {
                let len = usize::try_from(read_varint(payload, &mut idx).ok()?).ok()?;
                let end = idx.saturating_add(len).min(payload.len());
                if tag >> FIELD_NUMBER_SHIFT == ANY_VALUE_FIELD_NUMBER {
                    return Some(&payload[idx..end]);
                }
                idx = end;
            }
            WIRE_TYPE_VARINT => {
                read_varint(payload, &mut idx).ok()?;
            }
            _ => return None,
        }
    }
    None
}

/// Walks top-level fields until the statement field is found.
///
/// `Ok(None)` means the scan ended (or stopped at an unsupported wire type)
/// without seeing field 1.
fn scan_statement(payload: &[u8]) -> Result<Option<String>, WireError> {
    let mut idx = 0;
    while idx < payload.len() {
        let tag = read_varint(payload, &mut idx)?;
        match tag & WIRE_TYPE_MASK {
            WIRE_TYPE_LENGTH_DELIMITED => {
                let field = read_length_delimited(payload, &mut idx)?;
                // First match wins; later duplicates are never inspected.
                if tag >> FIELD_NUMBER_SHIFT == STATEMENT_FIELD_NUMBER {
                    return std::str::from_utf8(field)
                        .map(|statement| Some(statement.to_owned()))
                        .map_err(|_| WireError::InvalidUtf8);
                }
            }
            WIRE_TYPE_VARINT => {
                read_varint(payload, &mut idx)?;
            }
            _ => return Ok(None),
        }
    }
    Ok(None)
}

/// Decodes one little-endian base-128 varint starting at `idx`.
pub(crate) fn read_varint(input: &[u8], idx: &mut usize) -> Result<u64, WireError> {
    let start = *idx;
    let mut value = 0u64;
    let mut shift = 0u32;
    while *idx < input.len() {
        if shift >= 64 {
            return Err(WireError::VarintOverflow(start));
        }
        let byte = input[*idx];
        *idx += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(WireError::TruncatedVarint(start))
}

/// Reads a varint length prefix followed by exactly that many bytes.
fn read_length_delimited<'a>(input: &'a [u8], idx: &mut usize) -> Result<&'a [u8], WireError> {
    let offset = *idx;
    let len = read_varint(input, idx)?;
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| idx.checked_add(len))
        .filter(|end| *end <= input.len())
        .ok_or(WireError::TruncatedField { offset, len })?;
    let field = &input[*idx..end];
    *idx = end;
    Ok(field)
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}
