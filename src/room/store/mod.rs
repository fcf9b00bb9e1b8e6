//! Room persistence: the store contract, its implementations and the expiry
//! reaper.

mod memory;
mod sqlite;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::room::model::{NewRoom, RoomRecord};
use crate::util::clock::Clock;

pub use memory::MemoryRoomStore;
pub use sqlite::SqliteRoomStore;

/// Which unique key a rejected insert collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    RoomName,
    Token,
    VerificationCode,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0:?}")]
    Duplicate(UniqueKey),

    #[error("store backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// A collection of rooms with atomic uniqueness on room name, token and
/// verification code. A rejected insert must leave nothing behind.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn insert(&self, room: NewRoom) -> Result<RoomRecord, StoreError>;

    async fn find_by_name(&self, room_name: &str) -> Result<Option<RoomRecord>, StoreError>;

    /// Rooms owned by `owner` whose token is still valid at `now`, newest
    /// first.
    async fn list_live_by_owner(
        &self,
        owner: &str,
        now: OffsetDateTime,
    ) -> Result<Vec<RoomRecord>, StoreError>;

    /// Removes every room whose token expired at or before `now`. Returns the
    /// number removed.
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError>;
}

/// Periodically purge expired rooms, the way a TTL index would.
pub fn spawn_reaper(
    store: Arc<dyn RoomStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.purge_expired(clock.now()).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "purged expired rooms"),
                Err(err) => tracing::warn!(error = %err, "failed to purge expired rooms"),
            }
        }
    })
}
