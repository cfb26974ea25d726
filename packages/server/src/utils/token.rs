use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};

/// 43 alphanumeric characters carry more than 256 bits of entropy.
const TOKEN_LEN: usize = 43;

/// Generate an opaque bearer secret.
pub fn generate() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest. Only digests are persisted.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
