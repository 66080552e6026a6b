use compact_str::CompactString;
use thiserror::Error;

use crate::account::Account;

/// Fallback service name when a URI names no issuer anywhere.
pub const UNKNOWN_SERVICE: &str = "Unknown Service";

/// Errors from provisioning-URI parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpauthError {
    /// The text is not an `otpauth://` URI at all
    #[error("not an otpauth URI")]
    NotOtpauth,
    /// The URI carries a type other than `totp`
    #[error("unsupported otpauth type {0:?}")]
    UnsupportedType(String),
    /// The `secret` query parameter is absent or empty
    #[error("secret parameter missing")]
    MissingSecret,
    /// The query string could not be parsed
    #[error("malformed query string")]
    Query,
    /// The label's percent-encoding is broken
    #[error("malformed label encoding")]
    Label,
}

/// Credential material extracted from a scanned provisioning URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Service the code is for
    pub service: CompactString,
    /// Account label within the service
    pub label: CompactString,
    /// Base32 secret text, decoded downstream by the codec
    pub secret: CompactString,
}

impl Provisioned {
    /// Turn the scanned material into a stored account with a fresh id.
    pub fn into_account(self) -> Account {
        Account::new(self.service, self.label, self.secret)
    }
}

/// Parse an `otpauth://totp/...` provisioning URI.
///
/// The label is the last path segment, percent-decoded, and follows the
/// `issuer:account` convention. The service name falls back from the
/// `issuer` parameter to the label's issuer half to [`UNKNOWN_SERVICE`];
/// the account label is the half after the colon, or the whole label when
/// there is no colon. A missing or empty `secret` parameter is an error;
/// there is nothing to provision without one.
pub fn parse(uri: &str) -> Result<Provisioned, OtpauthError> {
    let rest = uri.strip_prefix("otpauth://").ok_or(OtpauthError::NotOtpauth)?;
    let (kind, rest) = rest.split_once('/').ok_or(OtpauthError::NotOtpauth)?;
    if !kind.eq_ignore_ascii_case("totp") {
        return Err(OtpauthError::UnsupportedType(kind.to_owned()));
    }

    let (raw_label, query) = match rest.split_once('?') {
        Some((label, query)) => (label, query),
        None => (rest, ""),
    };
    let raw_label = raw_label.rsplit('/').next().unwrap_or(raw_label);
    let label_text = urlencoding::decode(raw_label).map_err(|_| OtpauthError::Label)?;

    let params: Vec<(String, String)> =
        serde_urlencoded::from_str(query).map_err(|_| OtpauthError::Query)?;
    let mut secret = None;
    let mut issuer = None;
    for (name, value) in params {
        match name.as_str() {
            "secret" => secret = Some(value),
            "issuer" => issuer = Some(value),
            _ => {}
        }
    }
    let secret = secret
        .filter(|value| !value.is_empty())
        .ok_or(OtpauthError::MissingSecret)?;

    let (label_issuer, account) = match label_text.split_once(':') {
        Some((issuer_half, account_half)) => (Some(issuer_half.trim()), account_half.trim()),
        None => (None, label_text.trim()),
    };

    let service = issuer
        .filter(|value| !value.is_empty())
        .map(CompactString::from)
        .or_else(|| {
            label_issuer
                .filter(|value| !value.is_empty())
                .map(CompactString::from)
        })
        .unwrap_or_else(|| CompactString::const_new(UNKNOWN_SERVICE));

    Ok(Provisioned {
        service,
        label: CompactString::from(account),
        secret: CompactString::from(secret),
    })
}
