//! Webhook signature validation.
//!
//! GitHub signs every delivery with HMAC-SHA256 over the raw request body
//! and sends the digest in `X-Hub-Signature-256` as `sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::ValidationError;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";

/// Validates GitHub webhook signatures against one webhook secret.
///
/// Comparison is constant-time. Neither the secret nor signature values are
/// ever logged.
///
/// # Examples
///
/// ```rust
/// use github_checks_sdk::webhook::SignatureValidator;
///
/// let validator = SignatureValidator::new("It's a Secret to Everybody");
/// let payload = b"Hello, World!";
/// let signature = "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";
///
/// assert!(validator.validate(payload, signature).unwrap());
/// ```
#[derive(Clone)]
pub struct SignatureValidator {
    secret: String,
}

impl SignatureValidator {
    /// Create a new signature validator.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Validate a webhook signature.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Signature is valid
    /// * `Ok(false)` - Signature is well formed but does not match
    /// * `Err` - Signature header is malformed (missing prefix, bad hex)
    pub fn validate(&self, payload: &[u8], signature: &str) -> Result<bool, ValidationError> {
        let signature_bytes = parse_signature(signature)?;
        let expected = self.compute_hmac(payload)?;

        Ok(constant_time_compare(&signature_bytes, &expected))
    }

    /// Produce the `sha256=<hex>` header value for a payload.
    pub fn sign(&self, payload: &[u8]) -> Result<String, ValidationError> {
        Ok(format!(
            "{}{}",
            SIGNATURE_PREFIX,
            hex::encode(self.compute_hmac(payload)?)
        ))
    }

    fn compute_hmac(&self, payload: &[u8]) -> Result<Vec<u8>, ValidationError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|e| {
            ValidationError::HmacError {
                message: format!("Failed to create HMAC instance: {}", e),
            }
        })?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn parse_signature(signature: &str) -> Result<Vec<u8>, ValidationError> {
    let hex_signature = signature.strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
        ValidationError::InvalidSignatureFormat {
            message: format!("Signature must start with '{}'", SIGNATURE_PREFIX),
        }
    })?;

    hex::decode(hex_signature).map_err(|e| ValidationError::InvalidSignatureFormat {
        message: format!("Invalid hex encoding in signature: {}", e),
    })
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    // Length is not secret; ct_eq needs equal lengths.
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
