//! Bearer-token verification for write endpoints.
//!
//! A token is `hex(subject ":" expiry_unix) "." hex(hmac_sha256(secret, payload))`.

use crate::error::AppError;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The authenticated caller of a protected request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub subject: String,
}

pub struct TokenAuth {
    secret: Vec<u8>,
}

impl TokenAuth {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        TokenAuth { secret: secret.into() }
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AppError::Unauthorized("signing key rejected".into()))
    }

    /// Issue a token for `subject` valid for `ttl`.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, AppError> {
        let expires = (Utc::now() + ttl).timestamp();
        let payload = format!("{}:{}", subject, expires);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = mac.finalize().into_bytes();
        Ok(format!("{}.{}", hex::encode(payload), hex::encode(signature)))
    }

    /// Check signature and expiry and return the caller the token was issued for.
    pub fn verify(&self, token: &str) -> Result<Caller, AppError> {
        let invalid = || AppError::Unauthorized("invalid or expired token".into());

        let (payload_hex, signature_hex) = token.split_once('.').ok_or_else(invalid)?;
        let payload = hex::decode(payload_hex).map_err(|_| invalid())?;
        let signature = hex::decode(signature_hex).map_err(|_| invalid())?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let payload = String::from_utf8(payload).map_err(|_| invalid())?;
        let (subject, expires) = payload.rsplit_once(':').ok_or_else(invalid)?;
        let expires: i64 = expires.parse().map_err(|_| invalid())?;
        if expires <= Utc::now().timestamp() {
            return Err(invalid());
        }
        Ok(Caller {
            subject: subject.to_string(),
        })
    }
}
