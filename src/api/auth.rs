use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Produces the `Authorization` header for the Adstream A5 API.
///
/// The token is `key:signature:epoch`, where the signature is the base64
/// HMAC-SHA256 of `key + epoch` under the secret. Tokens are time bound, so
/// one is minted per request.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn authorization(&self) -> Result<String> {
        self.authorization_at(Utc::now().timestamp())
    }

    pub fn authorization_at(&self, epoch: i64) -> Result<String> {
        let epoch = epoch.to_string();
        let message = format!("{}{}", self.credentials.key, epoch);
        Ok(format!(
            "A5-API {}:{}:{}",
            self.credentials.key,
            self.sign(message.as_bytes())?,
            epoch
        ))
    }

    fn sign(&self, payload: &[u8]) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.secret.as_bytes())
            .map_err(|err| anyhow!("invalid Adstream secret: {err}"))?;
        mac.update(payload);
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}
