//! HTTP routes: welcome, health, room creation, token verification, owner
//! listing and one-time codes.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequest, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{Identity, IdentityKey};
use crate::room::model::{OwnedRoomSummary, ParticipantsInput, VerifiedRoom};
use crate::room::{RoomError, RoomManager};
use crate::util::clock::Clock;
use crate::util::id::generate_otp;

/// Header carrying the room token when the body does not.
pub const ROOM_TOKEN_HEADER: &str = "x-room-token";

const OTP_EXPIRY_MS: u64 = 5 * 60 * 1000;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub rooms: RoomManager,
    pub identity: IdentityKey,
    pub clock: Arc<dyn Clock>,
}

pub fn router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
        .allow_origin(match cors_origin.parse::<HeaderValue>() {
            Ok(origin) => AllowOrigin::exact(origin),
            Err(_) => {
                tracing::warn!(origin = %cors_origin, "unusable CORS origin, allowing none");
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        });

    Router::new()
        .route("/", get(welcome))
        .route("/healthz", get(health))
        .route("/rooms", post(create_room))
        .route("/rooms/verify", post(verify_token))
        .route("/private-room/get-room-by-owner", get(rooms_by_owner))
        .route("/verification/getOtp", get(otp))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// `Json` whose rejections answer with the usual error body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(RoomError))]
pub struct JsonBody<T>(pub T);

async fn welcome() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Welcome to Backend Server" }))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub participants: Option<ParticipantsInput>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub token_expires_at: OffsetDateTime,
    pub room_name: String,
    pub participants: usize,
    pub owner: String,
}

async fn create_room(
    State(rooms): State<RoomManager>,
    identity: Option<Identity>,
    JsonBody(req): JsonBody<CreateRoomRequest>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), RoomError> {
    let issued = rooms
        .create_room(
            identity.as_ref().map(|i| i.user_id.as_str()),
            &req.room_name,
            req.participants,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse {
            token: issued.token,
            token_expires_at: issued.token_expires_at,
            room_name: issued.room_name,
            participants: issued.participants.len(),
            owner: issued.owner,
        }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTokenRequest {
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub token: Option<String>,
}

async fn verify_token(
    State(rooms): State<RoomManager>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<VerifyTokenRequest>,
) -> Result<Json<VerifiedRoom>, RoomError> {
    let from_header = headers
        .get(ROOM_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let token = [req.token, from_header]
        .into_iter()
        .flatten()
        .find(|t| !t.trim().is_empty())
        .unwrap_or_default();

    Ok(Json(rooms.verify_token(&req.room_name, &token).await?))
}

async fn rooms_by_owner(
    State(rooms): State<RoomManager>,
    identity: Option<Identity>,
) -> Result<Json<Vec<OwnedRoomSummary>>, RoomError> {
    let owned = rooms
        .list_rooms_by_owner(identity.as_ref().map(|i| i.user_id.as_str()))
        .await?;
    Ok(Json(owned))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OtpResponse {
    pub message: String,
    pub otp: String,
    pub expiry: u64,
}

async fn otp() -> impl IntoResponse {
    Json(OtpResponse {
        message: "OTP Generated Successfully".into(),
        otp: generate_otp(),
        expiry: OTP_EXPIRY_MS,
    })
}
