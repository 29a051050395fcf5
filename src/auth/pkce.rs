//! PKCE (RFC 7636) material for the `S256` challenge method.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::sha256;

/// Number of random bytes behind every code verifier.
pub const VERIFIER_BYTES: usize = 32;

/// The only challenge method this client sends.
pub const CHALLENGE_METHOD: &str = "S256";

/// A code verifier and the challenge derived from it.
///
/// The pair is only ever built together, so the challenge can never drift
/// from the verifier it was computed from.
#[derive(Clone, PartialEq, Eq)]
pub struct PkcePair {
    verifier: String,
    challenge: String,
}

impl PkcePair {
    /// Fresh verifier from the OS random source, plus its challenge.
    pub fn generate() -> Self {
        Self::from_verifier(generate_verifier())
    }

    /// Rebuild a pair from a known verifier.
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = generate_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    pub fn method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

impl fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// 32 bytes from the OS CSPRNG, base64url-encoded without padding (43 chars).
///
/// Panics if the operating system cannot supply randomness; there is no
/// sensible way to continue an auth flow without it.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64url_encode(&bytes)
}

/// `BASE64URL(SHA256(verifier))`.
pub fn generate_challenge(verifier: &str) -> String {
    base64url_encode(&sha256(verifier.as_bytes()))
}

/// RFC 4648 §5 encoding, padding stripped.
pub fn base64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}
