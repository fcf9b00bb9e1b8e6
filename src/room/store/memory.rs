//! In-process room store.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{RoomStore, StoreError, UniqueKey};
use crate::room::model::{NewRoom, RoomRecord};
use crate::util::clock::Clock;

#[derive(Default)]
struct Indexes {
    // room name -> (insertion sequence, record)
    by_name: HashMap<String, (u64, RoomRecord)>,
    // token -> room name
    tokens: HashMap<String, String>,
    // verification code -> room name
    codes: HashMap<String, String>,
    next_seq: u64,
}

/// Every index lives behind one lock so the uniqueness check and the write
/// happen as a single step.
pub struct MemoryRoomStore {
    inner: Mutex<Indexes>,
    clock: Arc<dyn Clock>,
}

impl MemoryRoomStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { inner: Mutex::new(Indexes::default()), clock }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn insert(&self, room: NewRoom) -> Result<RoomRecord, StoreError> {
        let now = self.clock.now();
        let mut idx = self.inner.lock();

        if idx.by_name.contains_key(&room.room_name) {
            return Err(StoreError::Duplicate(UniqueKey::RoomName));
        }
        if idx.tokens.contains_key(&room.token) {
            return Err(StoreError::Duplicate(UniqueKey::Token));
        }
        if idx.codes.contains_key(&room.verification_code) {
            return Err(StoreError::Duplicate(UniqueKey::VerificationCode));
        }

        let record = RoomRecord::stamped(room, now);
        let seq = idx.next_seq;
        idx.next_seq += 1;
        idx.tokens.insert(record.token.clone(), record.room_name.clone());
        idx.codes
            .insert(record.verification_code.clone(), record.room_name.clone());
        idx.by_name
            .insert(record.room_name.clone(), (seq, record.clone()));
        Ok(record)
    }

    async fn find_by_name(&self, room_name: &str) -> Result<Option<RoomRecord>, StoreError> {
        Ok(self
            .inner
            .lock()
            .by_name
            .get(room_name)
            .map(|(_, r)| r.clone()))
    }

    async fn list_live_by_owner(
        &self,
        owner: &str,
        now: OffsetDateTime,
    ) -> Result<Vec<RoomRecord>, StoreError> {
        let idx = self.inner.lock();
        let mut rooms: Vec<(u64, &RoomRecord)> = idx
            .by_name
            .values()
            .filter(|(_, r)| r.owner == owner && r.is_live(now))
            .map(|(seq, r)| (*seq, r))
            .collect();
        rooms.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });
        Ok(rooms.into_iter().map(|(_, r)| r.clone()).collect())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut idx = self.inner.lock();
        let expired: Vec<String> = idx
            .by_name
            .iter()
            .filter(|(_, (_, r))| r.token_expires_at <= now)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &expired {
            if let Some((_, r)) = idx.by_name.remove(name) {
                idx.tokens.remove(&r.token);
                idx.codes.remove(&r.verification_code);
            }
        }
        Ok(expired.len() as u64)
    }
}
