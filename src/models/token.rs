//! Token model and codec: random plaintext generation and one-way
//! fingerprinting. Only the fingerprint is ever persisted or cached;
//! the plaintext is returned to the caller exactly once, at issuance.

use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 16 random bytes encode to 26 base-32 characters, unpadded.
pub const PLAINTEXT_LEN: usize = 26;

/// SHA-256 digest of the plaintext; the lookup key everywhere.
pub type Fingerprint = [u8; 32];

/// Purpose tag partitioning tokens. A token is valid only when looked up
/// under its issuing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activation" => Ok(Scope::Activation),
            "authentication" => Ok(Scope::Authentication),
            other => Err(anyhow::anyhow!("unknown token scope: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub plaintext: String,
    pub fingerprint: Fingerprint,
    pub identity: i64,
    pub scope: Scope,
    pub expiry: DateTime<Utc>,
}

impl Token {
    /// Generate a fresh token: 128 bits from the OS entropy source,
    /// base-32 encoded. Fails only if the randomness source fails, which
    /// is fatal for a service that mints credentials.
    pub fn generate(identity: i64, ttl: Duration, scope: Scope) -> anyhow::Result<Token> {
        let mut random_bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut random_bytes)
            .context("OS randomness source failed")?;

        let plaintext = BASE32_NOPAD.encode(&random_bytes);
        let fingerprint = fingerprint(&plaintext);

        Ok(Token {
            plaintext,
            fingerprint,
            identity,
            scope,
            expiry: Utc::now() + ttl,
        })
    }
}

/// Deterministic one-way digest of a plaintext. Used identically at
/// issuance and verification time.
pub fn fingerprint(plaintext: &str) -> Fingerprint {
    let digest = Sha256::digest(plaintext.as_bytes());
    digest.into()
}

/// Shape check for inbound plaintexts, applied before any store or cache
/// work so malformed input never costs a round trip.
pub fn validate_plaintext(plaintext: &str) -> bool {
    !plaintext.is_empty() && plaintext.len() == PLAINTEXT_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_plaintext_is_26_base32_chars() {
        let token = Token::generate(11, Duration::hours(24), Scope::Authentication).unwrap();
        assert_eq!(token.plaintext.len(), PLAINTEXT_LEN);
        assert!(token
            .plaintext
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c)));
        assert!(token.expiry > Utc::now());
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let token = Token::generate(1, Duration::hours(1), Scope::Activation).unwrap();
        assert_eq!(token.fingerprint, fingerprint(&token.plaintext));
        assert_eq!(fingerprint("ABC123"), fingerprint("ABC123"));
        assert_ne!(fingerprint("ABC123"), fingerprint("ABC124"));
    }

    #[test]
    fn distinct_tokens_get_distinct_plaintexts() {
        let a = Token::generate(1, Duration::hours(1), Scope::Authentication).unwrap();
        let b = Token::generate(1, Duration::hours(1), Scope::Authentication).unwrap();
        assert_ne!(a.plaintext, b.plaintext);
    }

    #[test]
    fn scope_round_trips_through_str() {
        for scope in [Scope::Activation, Scope::Authentication] {
            assert_eq!(scope.as_str().parse::<Scope>().unwrap(), scope);
        }
        assert!("movies:read".parse::<Scope>().is_err());
    }

    #[test]
    fn plaintext_shape_validation() {
        assert!(validate_plaintext("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
        assert!(!validate_plaintext(""));
        assert!(!validate_plaintext("too-short"));
        assert!(!validate_plaintext("ABCDEFGHIJKLMNOPQRSTUVWXYZ2"));
    }
}
