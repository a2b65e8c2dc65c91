//! Time-boxed session credential — a compact JWT signed with ES256.
//!
//! ```text
//!   base64url(header) . base64url(claims) . base64url(ECDSA-P256-SHA256(key, signing_input))
//! ```
//!
//! Claims are `{iat, exp, aud}` with `aud` = cloud project id. A credential
//! is minted for exactly one connection and never reused. The signature is
//! the fixed 64-byte `r || s` form JWS expects, not DER.
//!
//! Crypto is handled by the `p256` crate (RFC 6979 deterministic nonces),
//! identical on ESP-IDF and host targets.

use core::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::SecretKey;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use serde::Serialize;

/// JOSE header; constant for every token this device issues.
const HEADER_JSON: &str = r#"{"alg":"ES256","typ":"JWT"}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// The device key is neither PKCS#8 nor SEC1 PEM for P-256.
    InvalidKey,
    SigningFailed,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "device key is not a P-256 private key in PEM"),
            Self::SigningFailed => write!(f, "credential signing failed"),
        }
    }
}

impl core::error::Error for CredentialError {}

/// Parse the device private key, as produced by
/// `openssl ecparam -genkey -name prime256v1` (SEC1) or its PKCS#8 export.
pub fn signing_key_from_pem(pem: &str) -> Result<SigningKey, CredentialError> {
    let pem = pem.trim();
    SecretKey::from_pkcs8_pem(pem)
        .or_else(|_| SecretKey::from_sec1_pem(pem))
        .map(SigningKey::from)
        .map_err(|_| CredentialError::InvalidKey)
}

#[derive(Serialize)]
struct Claims<'a> {
    iat: u64,
    exp: u64,
    aud: &'a str,
}

/// A signed token plus the bookkeeping needed to retire it on time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    /// Wall-clock issue time (Unix seconds).
    pub issued_at: u64,
    /// Wall-clock expiry (Unix seconds).
    pub expires_at: u64,
    /// Monotonic deadline (µs since boot) equivalent to `expires_at`.
    pub valid_until_us: u64,
}

impl SessionCredential {
    /// `true` once `now_us` is within `margin_secs` of expiry.
    pub fn needs_refresh(&self, now_us: u64, margin_secs: u32) -> bool {
        let margin_us = u64::from(margin_secs) * 1_000_000;
        now_us.saturating_add(margin_us) >= self.valid_until_us
    }
}

/// Mints [`SessionCredential`]s for one audience.
pub struct CredentialIssuer {
    audience: String,
    key: SigningKey,
    validity_secs: u32,
}

impl CredentialIssuer {
    pub fn new(audience: &str, key: SigningKey, validity_secs: u32) -> Self {
        Self {
            audience: String::from(audience),
            key,
            validity_secs,
        }
    }

    /// Sign a fresh token valid from `now_unix` for the configured window.
    pub fn issue(
        &self,
        now_unix: u64,
        now_uptime_us: u64,
    ) -> Result<SessionCredential, CredentialError> {
        let validity = u64::from(self.validity_secs);
        let claims = Claims {
            iat: now_unix,
            exp: now_unix + validity,
            aud: &self.audience,
        };
        let claims_json =
            serde_json::to_vec(&claims).map_err(|_| CredentialError::SigningFailed)?;

        let mut token = URL_SAFE_NO_PAD.encode(HEADER_JSON);
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(claims_json));
        let signature: Signature = self
            .key
            .try_sign(token.as_bytes())
            .map_err(|_| CredentialError::SigningFailed)?;
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature.to_bytes()));

        Ok(SessionCredential {
            token,
            issued_at: now_unix,
            expires_at: now_unix + validity,
            valid_until_us: now_uptime_us + validity * 1_000_000,
        })
    }
}
