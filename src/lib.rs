//! Room-token issuance and validation for a multi-room chat backend, plus the
//! HTTP surface and the WebSocket relay that go with it.

pub mod auth;
pub mod config;
pub mod http;
pub mod room;
pub mod telemetry;
pub mod util;
pub mod ws;
