//! Configuration from environment variables.
//!
//! Every setting has a default, so both binaries start with zero
//! configuration for local development. Malformed or non-positive values fall
//! back to the default.

use std::{
    env,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use time::Duration as TtlDuration;

use crate::room::RoomPolicy;

/// Upper bound for `TOKEN_TTL_MINUTES`: one hundred years.
pub const MAX_TOKEN_TTL_MINUTES: u64 = 100 * 365 * 24 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend HTTP address. Env: `PORT`, default 8080, binds 0.0.0.0.
    pub http_addr: SocketAddr,

    /// Relay WebSocket address. Env: `RELAY_PORT`, default 3000.
    pub relay_addr: SocketAddr,

    /// SQLite URL, e.g. `sqlite://rooms.db`. Env: `DATABASE_URL`.
    /// Unset keeps rooms in process memory.
    pub database_url: Option<String>,

    /// Env: `CORS_ORIGIN`, default `http://localhost:5173`.
    pub cors_origin: String,

    /// Credential signing key, 64 hex chars. Env: `AUTH_HMAC_KEY`.
    pub auth_key: Option<[u8; 32]>,

    /// Env: `TOKEN_TTL_MINUTES` (default 1440, at most
    /// [`MAX_TOKEN_TTL_MINUTES`]), `MAX_PARTICIPANTS` (50), `MAX_TOKEN_TRIES` (3).
    pub room_policy: RoomPolicy,

    /// How often expired rooms are purged. Env: `REAP_INTERVAL_SECS`, default 60.
    pub reap_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            relay_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3000)),
            database_url: None,
            cors_origin: "http://localhost:5173".to_string(),
            auth_key: None,
            room_policy: RoomPolicy::default(),
            reap_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let positive = |key: &str| -> Option<u64> {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|n| *n > 0)
        };
        let port = |key: &str, fallback: SocketAddr| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u16>().ok())
                .map(|p| SocketAddr::from((Ipv4Addr::UNSPECIFIED, p)))
                .unwrap_or(fallback)
        };

        let mut room_policy = defaults.room_policy.clone();
        if let Some(minutes) = positive("TOKEN_TTL_MINUTES")
            .filter(|m| *m <= MAX_TOKEN_TTL_MINUTES)
            .and_then(|m| i64::try_from(m).ok())
        {
            room_policy.token_ttl = TtlDuration::minutes(minutes);
        }
        if let Some(max) = positive("MAX_PARTICIPANTS") {
            room_policy.max_participants = max as usize;
        }
        if let Some(tries) = positive("MAX_TOKEN_TRIES").and_then(|t| u32::try_from(t).ok()) {
            room_policy.max_token_tries = tries;
        }

        Self {
            http_addr: port("PORT", defaults.http_addr),
            relay_addr: port("RELAY_PORT", defaults.relay_addr),
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            cors_origin: lookup("CORS_ORIGIN")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.cors_origin),
            auth_key: lookup("AUTH_HMAC_KEY")
                .and_then(|v| hex::decode(v.trim()).ok())
                .and_then(|v| v.try_into().ok()),
            room_policy,
            reap_interval: positive("REAP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.reap_interval),
        }
    }
}
