//! Room issuance, token verification and owner listing.

use std::sync::Arc;

use serde_json::Value;
use subtle::ConstantTimeEq;
use time::Duration;
use uuid::Uuid;

use crate::room::error::RoomError;
use crate::room::model::{IssuedRoom, NewRoom, OwnedRoomSummary, ParticipantsInput, VerifiedRoom};
use crate::room::store::{RoomStore, StoreError, UniqueKey};
use crate::util::clock::Clock;
use crate::util::id::{
    generate_room_token, generate_verification_code, DEFAULT_TOKEN_BYTES,
    DEFAULT_VERIFICATION_CODE_BYTES,
};

/// Tunables for room issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPolicy {
    pub token_bytes: usize,
    pub verification_code_bytes: usize,
    pub token_ttl: Duration,
    /// Total insert attempts before giving up on token collisions.
    pub max_token_tries: u32,
    pub max_participants: usize,
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            token_bytes: DEFAULT_TOKEN_BYTES,
            verification_code_bytes: DEFAULT_VERIFICATION_CODE_BYTES,
            token_ttl: Duration::hours(24),
            max_token_tries: 3,
            max_participants: 50,
        }
    }
}

#[derive(Clone)]
pub struct RoomManager {
    store: Arc<dyn RoomStore>,
    clock: Arc<dyn Clock>,
    policy: RoomPolicy,
}

impl RoomManager {
    pub fn new(store: Arc<dyn RoomStore>, clock: Arc<dyn Clock>, policy: RoomPolicy) -> Self {
        Self { store, clock, policy }
    }

    /// Create a room owned by `owner_id` and issue its access token.
    ///
    /// Token collisions are retried up to `max_token_tries` times; a taken
    /// room name fails straight away with [`RoomError::Conflict`].
    pub async fn create_room(
        &self,
        owner_id: Option<&str>,
        room_name: &str,
        participants: Option<ParticipantsInput>,
    ) -> Result<IssuedRoom, RoomError> {
        let owner = owner_id
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .ok_or(RoomError::Unauthenticated)?;
        let room_name = room_name.trim();
        if room_name.is_empty() {
            return Err(RoomError::InvalidArgument("roomName is required".into()));
        }
        let participants =
            normalize_participants(owner, participants.as_ref(), self.policy.max_participants)?;

        let attempts = self.policy.max_token_tries.max(1);
        for attempt in 1..=attempts {
            let now = self.clock.now();
            let token_expires_at = now.checked_add(self.policy.token_ttl).ok_or_else(|| {
                tracing::error!(room = %room_name, ttl = %self.policy.token_ttl, "token expiry out of range");
                RoomError::InvalidArgument("token expiry out of range".into())
            })?;
            let room = NewRoom {
                id: Uuid::new_v4(),
                room_name: room_name.to_owned(),
                participants: participants.clone(),
                owner: owner.to_owned(),
                verification_code: generate_verification_code(self.policy.verification_code_bytes),
                token: generate_room_token(self.policy.token_bytes),
                token_expires_at,
            };

            match self.store.insert(room).await {
                Ok(record) => {
                    tracing::info!(
                        room = %record.room_name,
                        owner = %record.owner,
                        participants = record.participants.len(),
                        attempt,
                        "room created"
                    );
                    return Ok(record.into());
                }
                Err(StoreError::Duplicate(UniqueKey::RoomName)) => {
                    tracing::debug!(room = %room_name, "room name already taken");
                    return Err(RoomError::Conflict);
                }
                Err(StoreError::Duplicate(key)) => {
                    tracing::warn!(room = %room_name, attempt, ?key, "room token collision, regenerating");
                }
                Err(err) => {
                    tracing::error!(room = %room_name, attempt, error = %err, "failed to persist room");
                    return Err(RoomError::StoreUnavailable);
                }
            }
        }

        tracing::error!(room = %room_name, attempts, "room token space exhausted");
        Err(RoomError::Exhausted { attempts })
    }

    /// Check `presented_token` against the room's token.
    pub async fn verify_token(
        &self,
        room_name: &str,
        presented_token: &str,
    ) -> Result<VerifiedRoom, RoomError> {
        let room_name = room_name.trim();
        let presented = presented_token.trim();
        if room_name.is_empty() {
            return Err(RoomError::InvalidArgument("roomName is required".into()));
        }
        if presented.is_empty() {
            return Err(RoomError::InvalidArgument("token is required".into()));
        }

        let room = self
            .store
            .find_by_name(room_name)
            .await
            .map_err(|err| {
                tracing::error!(room = %room_name, error = %err, "failed to load room");
                RoomError::StoreUnavailable
            })?
            .ok_or(RoomError::NotFound)?;

        let matches: bool = room.token.trim().as_bytes().ct_eq(presented.as_bytes()).into();
        if !matches {
            return Err(RoomError::Unauthorized);
        }
        if room.token_expires_at <= self.clock.now() {
            return Err(RoomError::Expired);
        }

        Ok(VerifiedRoom {
            valid: true,
            room_name: room.room_name,
            participants: room.participants,
        })
    }

    /// Live rooms owned by `owner_id`, newest first.
    pub async fn list_rooms_by_owner(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<OwnedRoomSummary>, RoomError> {
        let owner = owner_id
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .ok_or(RoomError::Unauthenticated)?;

        let rooms = self
            .store
            .list_live_by_owner(owner, self.clock.now())
            .await
            .map_err(|err| {
                tracing::error!(owner = %owner, error = %err, "failed to list rooms");
                RoomError::StoreUnavailable
            })?;
        Ok(rooms.iter().map(OwnedRoomSummary::from).collect())
    }
}

/// Owner first, then the caller's identifiers in first-seen order without
/// duplicates. A bare count is validated but adds nobody.
fn normalize_participants(
    owner: &str,
    input: Option<&ParticipantsInput>,
    max: usize,
) -> Result<Vec<String>, RoomError> {
    let mut participants = vec![owner.to_owned()];
    match input {
        None => {}
        Some(ParticipantsInput::Count(value)) => {
            let count = parse_count(value).filter(|c| *c > 0).ok_or_else(|| {
                RoomError::InvalidArgument("participants must be a positive integer".into())
            })?;
            if count > max as u64 {
                return Err(RoomError::LimitExceeded { max });
            }
        }
        Some(ParticipantsInput::List(ids)) => {
            for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
                if !participants.iter().any(|p| p == id) {
                    participants.push(id.to_owned());
                }
            }
            if participants.len() > max {
                return Err(RoomError::LimitExceeded { max });
            }
        }
    }
    Ok(participants)
}

/// Whole numbers only. Negatives read as zero and oversized values saturate,
/// so they fail the positivity or limit check rather than the type check.
fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|_| 0))
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f.max(0.0) as u64)),
        Value::String(s) => {
            let s = s.trim();
            let digits = s.strip_prefix('-').unwrap_or(s);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else if s.starts_with('-') {
                Some(0)
            } else {
                Some(s.parse::<u64>().unwrap_or(u64::MAX))
            }
        }
        _ => None,
    }
}
