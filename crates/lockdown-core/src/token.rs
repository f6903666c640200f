//! Signed capability codec for approval links.
//!
//! A token is `{instance_id, region, expires_at}` signed with HMAC-SHA256
//! over the colon-joined tuple. All fields travel in plaintext in the link;
//! only the signature makes it tamper-proof. The secret is process-wide
//! configuration; rotation is out of scope.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::TokenError;

type HmacSha256 = Hmac<Sha256>;

/// Query parameters of an approval callback, as they arrive from the wire.
/// Every field is optional so missing parameters surface as a typed
/// `Malformed` error instead of a deserialization failure.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ApprovalQuery {
    #[serde(rename = "instanceId")]
    pub instance_id: Option<String>,
    pub region: Option<String>,
    pub signature: Option<String>,
    pub expires: Option<String>,
}

/// Verified claims extracted from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalClaims {
    pub instance_id: String,
    pub region: String,
}

/// An issued token, convertible into the callback URL.
#[derive(Debug, Clone)]
pub struct ApprovalToken {
    pub instance_id: String,
    pub region: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
    /// Hex-encoded HMAC-SHA256 signature.
    pub signature: String,
}

impl ApprovalToken {
    pub fn to_url(&self, base_url: &str) -> String {
        format!(
            "{}/approve?instanceId={}&region={}&expires={}&signature={}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(&self.instance_id),
            urlencoding::encode(&self.region),
            self.expires_at,
            self.signature,
        )
    }
}

#[derive(Debug, Clone)]
pub struct ApprovalCodec {
    secret: String,
}

impl ApprovalCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token valid for `ttl` from now.
    pub fn issue(&self, instance_id: &str, region: &str, ttl: Duration) -> ApprovalToken {
        let expires_at = (Utc::now() + ttl).timestamp_millis();
        ApprovalToken {
            instance_id: instance_id.to_string(),
            region: region.to_string(),
            expires_at,
            signature: self.sign(instance_id, region, expires_at),
        }
    }

    /// Verify a callback request. Expiry is checked before the signature,
    /// so a stale link reads as expired rather than tampered.
    pub fn verify(&self, query: &ApprovalQuery) -> Result<ApprovalClaims, TokenError> {
        let instance_id = query
            .instance_id
            .as_deref()
            .ok_or(TokenError::Malformed("instanceId"))?;
        let region = query.region.as_deref().ok_or(TokenError::Malformed("region"))?;
        let signature = query
            .signature
            .as_deref()
            .ok_or(TokenError::Malformed("signature"))?;
        let expires = query.expires.as_deref().ok_or(TokenError::Malformed("expires"))?;

        let expires_at: i64 = expires.parse().map_err(|_| TokenError::Malformed("expires"))?;
        if Utc::now().timestamp_millis() > expires_at {
            return Err(TokenError::Expired);
        }

        let provided = hex::decode(signature).map_err(|_| TokenError::InvalidSignature)?;
        let mut mac = self.mac();
        mac.update(payload(instance_id, region, expires_at).as_bytes());
        // verify_slice is the constant-time compare.
        mac.verify_slice(&provided)
            .map_err(|_| TokenError::InvalidSignature)?;

        Ok(ApprovalClaims {
            instance_id: instance_id.to_string(),
            region: region.to_string(),
        })
    }

    fn sign(&self, instance_id: &str, region: &str, expires_at: i64) -> String {
        let mut mac = self.mac();
        mac.update(payload(instance_id, region, expires_at).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC-SHA256 accepts keys of any length.
        HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC key length")
    }
}

fn payload(instance_id: &str, region: &str, expires_at: i64) -> String {
    format!("{instance_id}:{region}:{expires_at}")
}
