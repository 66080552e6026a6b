use std::time::SystemTime;

use fast32::base32::RFC4648_NOPAD;
use rand::Rng;

use crate::base32::{self, DecodeError};
use crate::clock::TotpClock;
use crate::hotp::{GenerateError, HotpSecret};

/// The default length of a generated TOTP secret in bytes, per RFC 6238
pub const RFC6238_KEY_LENGTH: usize = 20;

/// Shown in place of a code while an account has no secret yet.
pub const CODE_PLACEHOLDER: &str = "------";

/// Shown in place of a code when the secret is malformed or derivation fails.
pub const CODE_INVALID: &str = "Invalid";

/// TOTP secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpSecret(Box<[u8]>);

impl AsRef<[u8]> for TotpSecret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TotpSecret {
    /// Create a new TOTP secret from a byte array
    pub fn new(secret: &[u8]) -> Self {
        Self(secret.into())
    }

    /// Create a random secret of the RFC 6238 recommended size
    pub fn generate() -> Self {
        let mut secret = [0u8; RFC6238_KEY_LENGTH];
        rand::rng().fill(&mut secret);
        Self(secret.into())
    }

    /// Create a new TOTP secret from user-entered base32 text.
    ///
    /// Decoding is lenient the way [`base32::decode`] is: whitespace, `=`
    /// padding and letter case are all accepted.
    pub fn try_from_base32(secret: impl AsRef<str>) -> Result<Self, DecodeError> {
        Ok(Self(base32::decode(secret.as_ref())?.into_boxed_slice()))
    }

    /// Whether the secret holds no key material
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Generate the code for the window containing `time`
    pub fn generate_at(
        &self,
        clock: &TotpClock,
        time: SystemTime,
    ) -> Result<String, GenerateError> {
        HotpSecret::new(&self.0).generate(clock.counter_at(time))
    }

    /// Generate the code for the current window
    pub fn generate_now(&self, clock: &TotpClock) -> Result<String, GenerateError> {
        self.generate_at(clock, SystemTime::now())
    }

    /// Generate a provisioning URI for the TOTP secret
    pub fn to_uri(&self, label: impl AsRef<str>, issuer: impl AsRef<str>) -> String {
        format!(
            "otpauth://totp/{}?secret={}&issuer={}",
            urlencoding::encode(label.as_ref()),
            RFC4648_NOPAD.encode(&self.0),
            urlencoding::encode(issuer.as_ref()),
        )
    }
}

/// Render the code for stored secret text, with failures turned into the
/// sentinels the surrounding UI shows.
///
/// A missing secret renders [`CODE_PLACEHOLDER`]; a malformed secret or a
/// derivation failure renders [`CODE_INVALID`] and is logged. Errors never
/// escape this boundary; one bad secret among many cannot take the caller
/// down.
pub fn code_or_sentinel(secret_text: &str, clock: &TotpClock, time: SystemTime) -> String {
    match TotpSecret::try_from_base32(secret_text) {
        Ok(secret) => match secret.generate_at(clock, time) {
            Ok(code) => code,
            Err(GenerateError::MissingSecret) => CODE_PLACEHOLDER.to_owned(),
            Err(err) => {
                tracing::warn!(error = %err, "code derivation failed");
                CODE_INVALID.to_owned()
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "secret is not valid base32");
            CODE_INVALID.to_owned()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    const RFC_SECRET_B32: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn at(unix_secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(unix_secs)
    }

    #[test]
    fn rfc6238_time_vectors() {
        let clock = TotpClock::default();
        let secret = TotpSecret::try_from_base32(RFC_SECRET_B32).unwrap();
        assert_eq!(secret.generate_at(&clock, at(59)).unwrap(), "287082");
        assert_eq!(
            secret.generate_at(&clock, at(1_111_111_109)).unwrap(),
            "081804"
        );
        assert_eq!(
            secret.generate_at(&clock, at(1_234_567_890)).unwrap(),
            "005924"
        );
        assert_eq!(
            secret.generate_at(&clock, at(2_000_000_000)).unwrap(),
            "279037"
        );
    }

    #[test]
    fn same_window_same_code() {
        let clock = TotpClock::default();
        let secret = TotpSecret::try_from_base32(RFC_SECRET_B32).unwrap();
        assert_eq!(
            secret.generate_at(&clock, at(31)).unwrap(),
            secret.generate_at(&clock, at(59)).unwrap()
        );
    }

    #[test]
    fn generated_secrets_have_the_recommended_size() {
        let secret = TotpSecret::generate();
        assert_eq!(secret.as_ref().len(), RFC6238_KEY_LENGTH);
        assert_ne!(secret, TotpSecret::generate());
    }

    #[test]
    fn missing_secret_renders_the_placeholder() {
        let clock = TotpClock::default();
        assert_eq!(code_or_sentinel("", &clock, at(59)), CODE_PLACEHOLDER);
        assert_eq!(code_or_sentinel("  == ", &clock, at(59)), CODE_PLACEHOLDER);
    }

    #[test]
    fn malformed_secret_renders_the_invalid_sentinel() {
        let clock = TotpClock::default();
        assert_eq!(code_or_sentinel("not base32!", &clock, at(59)), CODE_INVALID);
    }

    #[test]
    fn well_formed_secret_renders_a_code() {
        let clock = TotpClock::default();
        assert_eq!(code_or_sentinel(RFC_SECRET_B32, &clock, at(59)), "287082");
    }

    #[test]
    fn uri_round_trips_through_the_codec() {
        let secret = TotpSecret::try_from_base32(RFC_SECRET_B32).unwrap();
        let uri = secret.to_uri("Example:alice@example.com", "Example");
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains(&format!("secret={RFC_SECRET_B32}")));
        assert!(uri.contains("issuer=Example"));
    }
}
