use std::fmt;

use anyhow::Result;
use argon2::password_hash::rand_core::{OsRng, RngCore};

use crate::hasher::SecretHasher;

/// Entropy of an invite secret. Hex-encoded this is 64 characters.
pub const TOKEN_BYTES: usize = 32;

/// A freshly issued invite secret and the only form of it that may be stored.
pub struct IssuedToken {
    pub raw_secret: String,
    pub hash: String,
}

// Keeps the raw secret out of `{:?}` output in logs and panics.
impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("raw_secret", &"<redacted>")
            .field("hash", &self.hash)
            .finish()
    }
}

/// Issues invite secrets and verifies presented tokens against stored hashes.
#[derive(Clone, Default)]
pub struct TokenCodec {
    hasher: SecretHasher,
}

impl TokenCodec {
    pub fn new(hasher: SecretHasher) -> Self {
        Self { hasher }
    }

    /// Shorthand for a codec over `SecretHasher::with_cost`.
    pub fn with_cost(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        Ok(Self::new(SecretHasher::with_cost(memory_kib, iterations, parallelism)?))
    }

    /// Generate a new secret from the OS CSPRNG and hash it with a fresh salt.
    pub fn issue(&self) -> Result<IssuedToken> {
        let mut secret = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut secret);
        let raw_secret = hex::encode(secret);
        let hash = self.hasher.hash(&raw_secret)?;

        Ok(IssuedToken { raw_secret, hash })
    }

    pub fn verify(&self, candidate: &str, hash: &str) -> bool {
        self.hasher.verify(candidate, hash)
    }

    /// Shape check for a presented token: exactly what `issue` produces.
    pub fn is_well_formed(candidate: &str) -> bool {
        candidate.len() == TOKEN_BYTES * 2
            && candidate
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_codec() -> TokenCodec {
        TokenCodec::with_cost(1024, 1, 1).unwrap()
    }

    #[test]
    fn issued_secret_verifies_against_its_hash() {
        let codec = cheap_codec();
        let token = codec.issue().unwrap();

        assert_eq!(token.raw_secret.len(), 64);
        assert!(TokenCodec::is_well_formed(&token.raw_secret));
        assert!(!token.hash.contains(&token.raw_secret));
        assert!(codec.verify(&token.raw_secret, &token.hash));
    }

    #[test]
    fn secret_does_not_verify_against_other_hash() {
        let codec = cheap_codec();
        let a = codec.issue().unwrap();
        let b = codec.issue().unwrap();

        assert_ne!(a.raw_secret, b.raw_secret);
        assert!(!codec.verify(&a.raw_secret, &b.hash));
        assert!(!codec.verify(&b.raw_secret, &a.hash));
    }

    #[test]
    fn shape_check_rejects_foreign_tokens() {
        assert!(!TokenCodec::is_well_formed(""));
        assert!(!TokenCodec::is_well_formed(&"a".repeat(63)));
        assert!(!TokenCodec::is_well_formed(&"A".repeat(64)));
        assert!(!TokenCodec::is_well_formed(&"g".repeat(64)));
        assert!(TokenCodec::is_well_formed(&"0f".repeat(32)));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let token = cheap_codec().issue().unwrap();
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains(&token.raw_secret));
        assert!(rendered.contains("<redacted>"));
    }
}
