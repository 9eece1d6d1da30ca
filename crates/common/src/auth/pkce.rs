//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for secure authorization without client secrets.
//! The CLI is a public client, so the code exchange is bound to a
//! client-held verifier instead.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a cryptographically secure code verifier.
///
/// Returns a URL-safe base64-encoded random string of 32 bytes (43
/// characters). Per RFC 7636, verifiers must be 43-128 characters long.
///
/// Randomness source failure is fatal to the process; there is no error
/// path here.
#[must_use]
pub fn generate_verifier() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Derive the code challenge from a verifier using SHA-256.
///
/// Per RFC 7636 the challenge is `BASE64URL(SHA256(ASCII(code_verifier)))`
/// with padding stripped. Pure and deterministic for a given verifier.
#[must_use]
pub fn derive_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let hash = hasher.finalize();
    URL_SAFE_NO_PAD.encode(hash)
}

/// PKCE verifier/challenge pair for one authorization attempt.
///
/// The verifier stays client-side until the token exchange; the challenge
/// travels in the authorization request. Transient, never persisted.
#[derive(Debug, Clone)]
pub struct PkcePair {
    /// Random string (43 chars base64url). Kept secret until the exchange.
    pub verifier: String,

    /// SHA-256 hash of the verifier (base64url, no padding). Sent in the
    /// authorization request for server-side validation.
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair from cryptographically secure randomness.
    #[must_use]
    pub fn generate() -> Self {
        let verifier = generate_verifier();
        let challenge = derive_challenge(&verifier);
        Self { verifier, challenge }
    }

    /// The challenge method, always `"S256"`.
    #[must_use]
    pub fn challenge_method(&self) -> &'static str {
        "S256"
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::pkce.
    use super::*;

    #[test]
    fn verifier_length_within_rfc_bounds() {
        let verifier = generate_verifier();
        // 32 random bytes encode to exactly 43 base64url characters.
        assert!(verifier.len() >= 43, "verifier too short: {} chars", verifier.len());
        assert!(verifier.len() <= 128, "verifier too long: {} chars", verifier.len());
    }

    #[test]
    fn challenge_is_deterministic() {
        let pair = PkcePair::generate();
        assert_eq!(pair.challenge, derive_challenge(&pair.verifier));
        assert_eq!(derive_challenge(&pair.verifier), derive_challenge(&pair.verifier));
    }

    #[test]
    fn challenge_is_base64url_without_padding() {
        let pair = PkcePair::generate();

        assert!(!pair.verifier.contains('='));
        assert!(!pair.challenge.contains('='));
        assert!(!pair.verifier.contains('+'));
        assert!(!pair.verifier.contains('/'));
        assert!(!pair.challenge.contains('+'));
        assert!(!pair.challenge.contains('/'));
    }

    #[test]
    fn pairs_are_unique() {
        let a = PkcePair::generate();
        let b = PkcePair::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.challenge, b.challenge);
    }

    #[test]
    fn challenge_method_is_s256() {
        assert_eq!(PkcePair::generate().challenge_method(), "S256");
    }

    #[test]
    fn known_vector() {
        // RFC 7636 appendix B reference vector.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(derive_challenge(verifier), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }
}
