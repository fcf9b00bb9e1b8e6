//! Signed bearer credentials identifying the caller.
//!
//! A credential is `base64url(claims) "." base64url(hmac_sha256(claims))`.
//! Requests carry it in a `userToken` or `token` cookie, or as
//! `Authorization: Bearer <credential>`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::room::RoomError;
use crate::util::clock::Clock;

type HmacSha256 = Hmac<Sha256>;

const COOKIE_NAMES: [&str; 2] = ["userToken", "token"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed credential")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("credential expired")]
    Expired,
}

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    exp: i64,
}

/// HMAC key shared with whoever mints credentials.
#[derive(Clone)]
pub struct IdentityKey {
    key: Arc<[u8; 32]>,
}

impl IdentityKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key: Arc::new(key) }
    }

    pub fn random() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.key.as_slice()).expect("hmac takes keys of any length")
    }

    pub fn issue(
        &self,
        user_id: &str,
        email: Option<&str>,
        ttl: Duration,
        now: OffsetDateTime,
    ) -> String {
        let claims = Claims {
            sub: user_id.to_owned(),
            email: email.map(str::to_owned),
            exp: (now + ttl).unix_timestamp(),
        };
        // Claims are plain strings and integers.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let mut mac = self.mac();
        mac.update(&payload);
        let sig = mac.finalize().into_bytes();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig)
        )
    }

    pub fn verify(&self, credential: &str, now: OffsetDateTime) -> Result<Identity, AuthError> {
        let (payload, sig) = credential.split_once('.').ok_or(AuthError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::Malformed)?;
        let sig = URL_SAFE_NO_PAD.decode(sig).map_err(|_| AuthError::Malformed)?;

        let mut mac = self.mac();
        mac.update(&payload);
        mac.verify_slice(&sig).map_err(|_| AuthError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| AuthError::Malformed)?;
        if claims.exp <= now.unix_timestamp() {
            return Err(AuthError::Expired);
        }
        if claims.sub.trim().is_empty() {
            return Err(AuthError::Malformed);
        }
        Ok(Identity { user_id: claims.sub, email: claims.email })
    }
}

/// Pull the raw credential out of the request: cookies first, then the
/// bearer header.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    cookie_credential(headers).or_else(|| bearer_credential(headers))
}

fn cookie_credential(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<(&str, &str)> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .collect();
    COOKIE_NAMES.iter().find_map(|name| {
        pairs
            .iter()
            .find(|(k, v)| k.trim() == *name && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_owned())
    })
}

fn bearer_credential(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();
    let scheme = parts.next()?;
    let credential = parts.next()?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| credential.to_owned())
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    IdentityKey: FromRef<S>,
    Arc<dyn Clock>: FromRef<S>,
{
    type Rejection = RoomError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let credential = credential_from_headers(&parts.headers).ok_or(RoomError::Unauthenticated)?;
        let key = IdentityKey::from_ref(state);
        let clock = <Arc<dyn Clock>>::from_ref(state);
        key.verify(&credential, clock.now()).map_err(|err| {
            tracing::warn!(error = %err, "rejected auth credential");
            RoomError::Unauthenticated
        })
    }
}
