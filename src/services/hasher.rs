//! SHA-256 identity of raw archive bytes.

use crate::errors::{ServiceError, ServiceResult};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Check that `claimed` has the shape of a hex SHA-256 digest and return it
/// lower-cased.
pub fn parse_digest(claimed: &str) -> ServiceResult<String> {
    let trimmed = claimed.trim();
    if trimmed.len() != DIGEST_HEX_LEN || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ServiceError::InvalidInput(
            "digest must be a 64 character SHA-256 hex string".into(),
        ));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Recompute the digest of `bytes` and compare it with an already parsed
/// claim. A mismatch is never trusted.
pub fn verify(bytes: &[u8], claimed: &str) -> ServiceResult<String> {
    let computed = digest_hex(bytes);
    if computed != claimed {
        return Err(ServiceError::Integrity {
            claimed: claimed.to_string(),
            computed,
        });
    }
    Ok(computed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            digest_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parse_accepts_uppercase_and_normalizes() {
        let upper = digest_hex(b"abc").to_ascii_uppercase();
        assert_eq!(parse_digest(&upper).unwrap(), digest_hex(b"abc"));
    }

    #[test]
    fn parse_rejects_wrong_shape() {
        assert!(matches!(
            parse_digest("abc"),
            Err(ServiceError::InvalidInput(_))
        ));
        let not_hex = "g".repeat(DIGEST_HEX_LEN);
        assert!(parse_digest(&not_hex).is_err());
    }

    #[test]
    fn verify_detects_mismatch() {
        let other = digest_hex(b"other");
        match verify(b"abc", &other) {
            Err(ServiceError::Integrity { claimed, computed }) => {
                assert_eq!(claimed, other);
                assert_eq!(computed, digest_hex(b"abc"));
            }
            other => panic!("expected integrity error, got {:?}", other),
        }
    }
}
