use crate::error::BookingError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Shared secret between us and the gateway for signing notifications.
///
/// Signatures are hex-encoded HMAC-SHA256 over the raw payload bytes.
#[derive(Clone)]
pub struct WebhookSecret {
    key: Vec<u8>,
}

impl WebhookSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    pub fn sign(&self, payload: &[u8]) -> Result<String, BookingError> {
        Ok(hex::encode(self.mac(payload)?))
    }

    pub fn verify(&self, payload: &[u8], signature: &str) -> Result<(), BookingError> {
        let provided = hex::decode(signature.trim()).map_err(|_| BookingError::InvalidSignature)?;
        let expected = self.mac(payload)?;
        if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            Ok(())
        } else {
            Err(BookingError::InvalidSignature)
        }
    }

    fn mac(&self, payload: &[u8]) -> Result<Vec<u8>, BookingError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| BookingError::InternalError(Box::new(std::io::Error::other(e.to_string()))))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}
