//! Token generation, constant-time comparison, and secret wrappers.
//!
//! Everything that mints or compares credentials lives here so the rest of
//! the workspace never touches a CSPRNG or a raw secret directly.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::SecretString;
use sha2::{Digest, Sha256};

/// Mint a 128-bit session id as 32 lowercase hex characters.
pub fn session_id_hex() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// Mint a 256-bit token as base64url without padding (43 characters).
///
/// Used for device codes, OAuth state values, and PKCE verifiers.
pub fn secure_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time comparison for credential validation.
///
/// A length mismatch returns early; for equal lengths the full input is
/// always scanned. This is string-level hardening only, with no claims about
/// memory-access patterns.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// A PKCE verifier/challenge pair.
#[derive(Clone, Debug)]
pub struct PkcePair {
    /// Random verifier string (base64url, no padding).
    pub verifier: String,
    /// SHA-256 challenge of the verifier (base64url, no padding).
    pub challenge: String,
}

/// Generate a new PKCE verifier/challenge pair.
///
/// The verifier is 32 cryptographically-secure random bytes encoded as
/// base64url (no padding). The challenge is the SHA-256 hash of the
/// verifier, also base64url-encoded.
pub fn generate_pkce() -> PkcePair {
    let verifier = secure_token();

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let hash = hasher.finalize();
    let challenge = URL_SAFE_NO_PAD.encode(hash);

    PkcePair { verifier, challenge }
}

/// An OAuth access token bound to a session.
///
/// The token value is zeroized on drop and redacted in `Debug` output.
#[derive(Clone)]
pub struct SessionToken {
    pub access_token: SecretString,
    pub token_type: String,
    pub scope: Option<String>,
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn session_id_is_32_lowercase_hex() {
        let id = session_id_hex();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn session_ids_are_unique() {
        let a = session_id_hex();
        let b = session_id_hex();
        assert_ne!(a, b);
    }

    #[test]
    fn secure_token_is_base64url_no_padding() {
        let token = secure_token();
        // 32 bytes in base64url = ceil(32 * 4/3) = 43 characters (no padding)
        assert_eq!(token.len(), 43);
        assert!(!token.contains('+'), "token must not contain '+'");
        assert!(!token.contains('/'), "token must not contain '/'");
        assert!(!token.contains('='), "token must not contain '='");
    }

    #[test]
    fn secure_tokens_are_unique() {
        let a = secure_token();
        let b = secure_token();
        assert_ne!(a, b);
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn constant_time_eq_single_bit_difference() {
        let a = [0b0000_0000u8; 16];
        let mut b = a;
        b[15] = 0b0000_0001;
        assert!(!constant_time_eq(&a, &b));
    }

    proptest::proptest! {
        #[test]
        fn constant_time_eq_agrees_with_slice_equality(
            a in proptest::collection::vec(proptest::num::u8::ANY, 0..64),
            b in proptest::collection::vec(proptest::num::u8::ANY, 0..64),
        ) {
            proptest::prop_assert_eq!(constant_time_eq(&a, &b), a == b);
            proptest::prop_assert!(constant_time_eq(&a, &a));
        }
    }

    #[test]
    fn pkce_challenge_matches_verifier_hash() {
        let pair = generate_pkce();
        let mut hasher = Sha256::new();
        hasher.update(pair.verifier.as_bytes());
        let hash = hasher.finalize();
        let expected = URL_SAFE_NO_PAD.encode(hash);
        assert_eq!(pair.challenge, expected);
    }

    #[test]
    fn pkce_verifier_and_challenge_lengths() {
        let pair = generate_pkce();
        assert_eq!(pair.verifier.len(), 43);
        // SHA-256 = 32 bytes → 43 base64url characters
        assert_eq!(pair.challenge.len(), 43);
    }

    #[test]
    fn each_pkce_call_produces_unique_pair() {
        let a = generate_pkce();
        let b = generate_pkce();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn session_token_debug_redacted() {
        let token = SessionToken {
            access_token: SecretString::from("ya29.secret-value"),
            token_type: "Bearer".into(),
            scope: Some("profile".into()),
        };
        let debug = format!("{token:?}");
        assert!(!debug.contains("ya29"), "token leaked in debug: {debug}");
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("Bearer"));
    }

    #[test]
    fn session_token_expose_secret() {
        let token = SessionToken {
            access_token: SecretString::from("tok-123"),
            token_type: "Bearer".into(),
            scope: None,
        };
        assert_eq!(token.access_token.expose_secret(), "tok-123");
    }
}
