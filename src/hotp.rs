use ring::hmac;
use thiserror::Error;

use crate::base32;

/// Number of decimal digits in a derived code.
pub const CODE_DIGITS: usize = 6;

/// Errors surfaced while deriving a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GenerateError {
    /// The secret is empty; there is nothing to key the HMAC with
    #[error("secret is empty")]
    MissingSecret,
    /// The HMAC digest was unusable for dynamic truncation
    #[error("digest too short for dynamic truncation")]
    Digest,
}

/// HOTP secret
pub struct HotpSecret(Box<[u8]>);

impl AsRef<[u8]> for HotpSecret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl HotpSecret {
    /// Create a new HOTP secret from a byte array
    pub fn new(secret: &[u8]) -> Self {
        Self(secret.into())
    }

    /// Create a new HOTP secret from base32 encoded text
    pub fn try_from_base32(secret: impl AsRef<str>) -> Result<Self, base32::DecodeError> {
        Ok(Self(base32::decode(secret.as_ref())?.into_boxed_slice()))
    }

    /// Whether the secret holds no key material
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Derive the RFC 4226 code for one counter value.
    ///
    /// The counter is encoded as 8 big-endian bytes and signed with
    /// HMAC-SHA1; the digest is dynamically truncated (4 bytes read
    /// big-endian at the offset named by the digest's last nibble, sign bit
    /// masked off) and reduced to a zero-padded 6-digit decimal string.
    ///
    /// Pure for fixed `(secret, counter)`: no clock, no hidden state.
    pub fn generate(&self, counter: u64) -> Result<String, GenerateError> {
        if self.0.is_empty() {
            return Err(GenerateError::MissingSecret);
        }

        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &self.0);
        let message = counter.to_be_bytes();
        let signature = hmac::sign(&key, &message);
        let digest = signature.as_ref();

        let offset = (digest.last().ok_or(GenerateError::Digest)? & 0x0f) as usize;
        let window: [u8; 4] = digest
            .get(offset..offset + 4)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(GenerateError::Digest)?;
        let value = u32::from_be_bytes(window) & 0x7fff_ffff;

        Ok(format!("{:0width$}", value % 1_000_000, width = CODE_DIGITS))
    }
}
