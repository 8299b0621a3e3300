//! Single-byte encoding utilities for thermal printers
//!
//! Receipt printers in their default code page expect one byte per glyph.
//! Text is converted from UTF-8 to Windows-1252 while ESC/POS command bytes
//! pass through untouched.

use tracing::instrument;

/// Byte emitted for characters the code page cannot represent
const REPLACEMENT: u8 = b'?';

/// Get the printed width of a string
///
/// Every character occupies one column in a single-byte code page.
pub fn text_width(s: &str) -> usize {
    s.chars().count()
}

/// Encode a single character, falling back to `?` when unmappable
fn encode_char(c: char, out: &mut Vec<u8>) {
    let mut tmp = [0u8; 4];
    let (bytes, _, had_errors) = encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut tmp));
    if had_errors || bytes.len() != 1 {
        out.push(REPLACEMENT);
    } else {
        out.extend_from_slice(&bytes);
    }
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to Windows-1252
///
/// ASCII bytes (0x00-0x7F) are copied exactly as is, which protects
/// ESC/POS commands and their parameter bytes from being rewritten.
/// Only bytes >= 0x80 are treated as UTF-8 sequences and transcoded.
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn convert_to_single_byte(bytes: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len());
    let mut buffer = Vec::new();

    for &b in bytes {
        if b < 0x80 {
            flush_buffer(&mut buffer, &mut result);
            result.push(b);
        } else {
            buffer.push(b);
        }
    }

    flush_buffer(&mut buffer, &mut result);
    result
}

/// Flush the non-ASCII buffer, transcoding UTF-8 to the single-byte page
fn flush_buffer(buffer: &mut Vec<u8>, result: &mut Vec<u8>) {
    if buffer.is_empty() {
        return;
    }

    let s = String::from_utf8_lossy(buffer);
    for c in s.chars() {
        encode_char(c, result);
    }
    buffer.clear();
}
