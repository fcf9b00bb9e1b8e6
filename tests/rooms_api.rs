use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use roomkeys::{
    auth::IdentityKey,
    http::{router, AppState},
    room::{
        store::{MemoryRoomStore, RoomStore, SqliteRoomStore},
        RoomManager, RoomPolicy,
    },
    util::clock::{Clock, ManualClock},
};
use serde_json::{json, Value};
use time::{macros::datetime, Duration};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    clock: Arc<ManualClock>,
    key: IdentityKey,
}

impl TestApp {
    fn with_store(clock: Arc<ManualClock>, store: Arc<dyn RoomStore>) -> Self {
        let key = IdentityKey::new([42u8; 32]);
        let state = AppState {
            rooms: RoomManager::new(store, clock.clone(), RoomPolicy::default()),
            identity: key.clone(),
            clock: clock.clone(),
        };
        Self { app: router(state, "http://localhost:5173"), clock, key }
    }

    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(datetime!(2026-09-01 12:00 UTC)));
        let store = Arc::new(MemoryRoomStore::new(clock.clone()));
        Self::with_store(clock, store)
    }

    fn bearer(&self, user: &str) -> String {
        let credential = self.key.issue(user, None, Duration::hours(1), self.clock.now());
        format!("Bearer {credential}")
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn create(&self, user: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut request = Request::post("/rooms").header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            request = request.header(header::AUTHORIZATION, self.bearer(user));
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn verify(&self, body: Value, header_token: Option<&str>) -> (StatusCode, Value) {
        let mut request =
            Request::post("/rooms/verify").header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = header_token {
            request = request.header("x-room-token", token);
        }
        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn owned(&self, user: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::get("/private-room/get-room-by-owner");
        if let Some(user) = user {
            request = request.header(header::AUTHORIZATION, self.bearer(user));
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }
}

#[tokio::test]
async fn standup_scenario() {
    let app = TestApp::new();

    let (status, created) = app
        .create(Some("u1"), json!({"roomName": "standup", "participants": ["u2", "u3"]}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["roomName"], "standup");
    assert_eq!(created["participants"], 3);
    assert_eq!(created["owner"], "u1");
    assert_eq!(created["tokenExpiresAt"], "2026-09-02T12:00:00Z");
    let token = created["token"].as_str().unwrap().to_owned();
    assert_eq!(token.len(), 22);

    let (status, verified) = app
        .verify(json!({"roomName": "standup", "token": token}), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        verified,
        json!({"valid": true, "roomName": "standup", "participants": ["u1", "u2", "u3"]})
    );

    let (status, body) = app.create(Some("u7"), json!({"roomName": "standup"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn create_requires_identity_and_valid_input() {
    let app = TestApp::new();

    let (status, body) = app.create(None, json!({"roomName": "r"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let (status, body) = app.create(Some("u1"), json!({"roomName": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let (status, body) = app
        .create(Some("u1"), json!({"roomName": "r", "participants": 0}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let (status, body) = app
        .create(Some("u1"), json!({"roomName": "r", "participants": 51}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "limit_exceeded");

    let (status, body) = app
        .create(Some("u1"), json!({"roomName": "r", "participants": "5"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["participants"], 1);
}

#[tokio::test]
async fn malformed_bodies_get_structured_errors() {
    let app = TestApp::new();

    let (status, body) = app.create(Some("u1"), json!({"roomName": 5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");
    assert!(body["message"].is_string());

    let (status, body) = app.verify(json!({"roomName": "r", "token": 7}), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let request = Request::post("/rooms")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, app.bearer("u1"))
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let request = Request::post("/rooms/verify")
        .body(Body::from(json!({"roomName": "r", "token": "t"}).to_string()))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");
}

#[tokio::test]
async fn expired_identity_is_unauthenticated() {
    let app = TestApp::new();
    let stale = app.bearer("u1");
    app.clock.advance(Duration::hours(2));

    let request = Request::post("/rooms")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, stale)
        .body(Body::from(json!({"roomName": "late"}).to_string()))
        .unwrap();
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verification_failures_are_distinct() {
    let app = TestApp::new();
    let (_, created) = app.create(Some("u1"), json!({"roomName": "ops"})).await;
    let token = created["token"].as_str().unwrap().to_owned();

    let (status, body) = app
        .verify(json!({"roomName": "ops", "token": "nope"}), None)
        .await;
    assert_eq!((status, body["error"].clone()), (StatusCode::UNAUTHORIZED, json!("unauthorized")));

    let (status, body) = app
        .verify(json!({"roomName": "missing", "token": token}), None)
        .await;
    assert_eq!((status, body["error"].clone()), (StatusCode::NOT_FOUND, json!("not_found")));

    let (status, body) = app.verify(json!({"roomName": "ops"}), None).await;
    assert_eq!((status, body["error"].clone()), (StatusCode::BAD_REQUEST, json!("invalid_argument")));

    app.clock.advance(Duration::hours(24));
    let (status, body) = app
        .verify(json!({"roomName": "ops", "token": token}), None)
        .await;
    assert_eq!((status, body["error"].clone()), (StatusCode::GONE, json!("expired")));
}

#[tokio::test]
async fn token_may_come_from_header_but_body_wins() {
    let app = TestApp::new();
    let (_, created) = app.create(Some("u1"), json!({"roomName": "hdr"})).await;
    let token = created["token"].as_str().unwrap().to_owned();

    let (status, _) = app.verify(json!({"roomName": "hdr"}), Some(token.as_str())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .verify(json!({"roomName": "hdr", "token": "   "}), Some(token.as_str()))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .verify(json!({"roomName": "hdr", "token": "wrong"}), Some(token.as_str()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn owner_listing_hides_expired_rooms() {
    let app = TestApp::new();
    app.create(Some("u1"), json!({"roomName": "first", "participants": ["u2"]}))
        .await;
    app.clock.advance(Duration::hours(20));
    app.create(Some("u1"), json!({"roomName": "second"})).await;
    app.create(Some("u2"), json!({"roomName": "not-mine"})).await;

    let (status, listed) = app.owned(Some("u1")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["roomName"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["second", "first"]);
    assert_eq!(listed[1]["participantsCount"], 2);
    assert!(listed[0]["id"].is_string());

    app.clock.advance(Duration::hours(5));
    let (_, listed) = app.owned(Some("u1")).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = app.owned(None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sqlite_store_backs_the_api() {
    let clock = Arc::new(ManualClock::new(datetime!(2026-09-01 12:00 UTC)));
    let store = SqliteRoomStore::connect("sqlite::memory:", clock.clone())
        .await
        .unwrap();
    let app = TestApp::with_store(clock, Arc::new(store));

    let (status, created) = app
        .create(Some("u1"), json!({"roomName": "persisted", "participants": ["u2"]}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = created["token"].as_str().unwrap().to_owned();

    let (status, verified) = app
        .verify(json!({"roomName": "persisted", "token": token}), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["participants"], json!(["u1", "u2"]));

    let (status, _) = app.create(Some("u2"), json!({"roomName": "persisted"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn misc_endpoints() {
    let app = TestApp::new();

    let (status, body) = app.send(Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to Backend Server");

    let (status, body) = app
        .send(Request::get("/verification/getOtp").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiry"], 300_000);
    assert_eq!(body["otp"].as_str().unwrap().len(), 6);

    let response = app
        .app
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
