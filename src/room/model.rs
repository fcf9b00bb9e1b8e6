//! Room records and the values the manager hands back to callers.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A room as it is about to be written. The store stamps `created_at` and
/// `updated_at` on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoom {
    pub id: Uuid,
    pub room_name: String,
    pub participants: Vec<String>,
    pub owner: String,
    pub verification_code: String,
    pub token: String,
    pub token_expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: Uuid,
    pub room_name: String,
    pub participants: Vec<String>,
    pub owner: String,
    pub verification_code: String,
    pub token: String,
    pub token_expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl RoomRecord {
    pub fn stamped(room: NewRoom, at: OffsetDateTime) -> Self {
        Self {
            id: room.id,
            room_name: room.room_name,
            participants: room.participants,
            owner: room.owner,
            verification_code: room.verification_code,
            token: room.token,
            token_expires_at: room.token_expires_at,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        !self.token.is_empty() && self.token_expires_at > now
    }
}

/// Participants as supplied on room creation: either explicit identifiers or
/// just a head count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParticipantsInput {
    List(Vec<String>),
    Count(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRoom {
    pub token: String,
    pub token_expires_at: OffsetDateTime,
    pub room_name: String,
    pub participants: Vec<String>,
    pub owner: String,
}

impl From<RoomRecord> for IssuedRoom {
    fn from(room: RoomRecord) -> Self {
        Self {
            token: room.token,
            token_expires_at: room.token_expires_at,
            room_name: room.room_name,
            participants: room.participants,
            owner: room.owner,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedRoom {
    pub valid: bool,
    pub room_name: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedRoomSummary {
    pub room_name: String,
    pub participants_count: usize,
    pub id: Uuid,
}

impl From<&RoomRecord> for OwnedRoomSummary {
    fn from(room: &RoomRecord) -> Self {
        Self {
            room_name: room.room_name.clone(),
            participants_count: room.participants.len(),
            id: room.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participants_accept_list_or_count() {
        let list: ParticipantsInput = serde_json::from_str(r#"["u2","u3"]"#).unwrap();
        assert_eq!(list, ParticipantsInput::List(vec!["u2".into(), "u3".into()]));

        let count: ParticipantsInput = serde_json::from_str("4").unwrap();
        assert_eq!(count, ParticipantsInput::Count(serde_json::json!(4)));

        let text: ParticipantsInput = serde_json::from_str(r#""4""#).unwrap();
        assert_eq!(text, ParticipantsInput::Count(serde_json::json!("4")));
    }
}
