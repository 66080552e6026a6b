use thiserror::Error;

/// The 32-symbol alphabet shared by RFC 4648 Base32 and `otpauth` secrets.
const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Error returned when secret text cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// A character outside `A`–`Z` / `2`–`7` survived normalization
    #[error("invalid base32 character {0:?}")]
    InvalidCharacter(char),
}

/// Strip the characters [`decode`] ignores and uppercase the rest.
///
/// Whitespace and `=` padding are insignificant in user-entered secrets, so
/// they are removed before any validation happens.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '=')
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Decode a human-typed or scanned Base32 secret into raw bytes.
///
/// Input is normalized first (see [`normalize`]), so lowercase secrets and
/// RFC-padded secrets are accepted transparently. Every remaining character
/// must belong to the 32-symbol alphabet; the first offender is reported in
/// [`DecodeError::InvalidCharacter`].
///
/// The characters form a stream of 5-bit groups; whole bytes are emitted as
/// soon as 8 bits are buffered and trailing bits that never fill a byte are
/// discarded, so the output is `input_len * 5 / 8` bytes for any input
/// length. An input that is empty after normalization decodes to an empty
/// byte sequence, not an error; callers tell "no secret" from "malformed
/// secret" by checking the length.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let normalized = normalize(text);
    let mut bytes = Vec::with_capacity(normalized.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;

    for ch in normalized.chars() {
        let value = ALPHABET
            .iter()
            .position(|&symbol| symbol == ch as u8)
            .ok_or(DecodeError::InvalidCharacter(ch))?;
        buffer = (buffer << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            bytes.push((buffer >> bits) as u8);
        }
    }

    Ok(bytes)
}
