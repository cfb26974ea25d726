use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::StorageError;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 signer for locally served object URLs.
///
/// The signature covers the object key and the expiry timestamp, so neither
/// can be altered without invalidating the URL.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| StorageError::Config(format!("HMAC key error: {e}")))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Hex-encoded signature for `key` valid until `expires` (unix seconds).
    pub fn sign(&self, key: &str, expires: i64) -> Result<String, StorageError> {
        Ok(hex::encode(self.mac(key, expires)?.finalize().into_bytes()))
    }

    /// Check a signature in constant time and reject it once `now` passes `expires`.
    pub fn verify(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if now > expires {
            return false;
        }
        let Ok(raw) = hex::decode(signature) else {
            return false;
        };
        match self.mac(key, expires) {
            Ok(mac) => mac.verify_slice(&raw).is_ok(),
            Err(_) => false,
        }
    }
}
