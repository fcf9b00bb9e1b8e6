//! SQLite-backed room store.

use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{RoomStore, StoreError, UniqueKey};
use crate::room::model::{NewRoom, RoomRecord};
use crate::util::clock::Clock;

const SCHEMA: [&str; 3] = [
    r#"CREATE TABLE IF NOT EXISTS rooms (
        id TEXT PRIMARY KEY NOT NULL,
        room_name TEXT NOT NULL UNIQUE,
        participants TEXT NOT NULL,
        owner TEXT NOT NULL,
        verification_code TEXT NOT NULL UNIQUE,
        token TEXT NOT NULL UNIQUE,
        token_expires_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS rooms_owner ON rooms (owner)",
    "CREATE INDEX IF NOT EXISTS rooms_token_expires_at ON rooms (token_expires_at)",
];

const ROOM_COLUMNS: &str = "id,room_name,participants,owner,verification_code,token,token_expires_at,created_at,updated_at";

#[derive(Clone)]
pub struct SqliteRoomStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteRoomStore {
    /// Connect to `url`, creating the database file if needed, and make sure
    /// the schema exists.
    pub async fn connect(url: &str, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(16);
        if url.contains(":memory:") {
            // Each in-memory connection is its own database, so pin exactly one.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool, clock };
        store.migrate().await?;
        Ok(store)
    }

    async fn name_taken(&self, room_name: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM rooms WHERE room_name=?")
            .bind(room_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(ms: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .map_err(|e| StoreError::Backend(Box::new(e)))
}

fn room_from_row(row: &SqliteRow) -> Result<RoomRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let participants: String = row.try_get("participants")?;
    Ok(RoomRecord {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Backend(Box::new(e)))?,
        room_name: row.try_get("room_name")?,
        participants: serde_json::from_str(&participants)
            .map_err(|e| StoreError::Backend(Box::new(e)))?,
        owner: row.try_get("owner")?,
        verification_code: row.try_get("verification_code")?,
        token: row.try_get("token")?,
        token_expires_at: from_millis(row.try_get("token_expires_at")?)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
    })
}

/// SQLite reports the offending column as `UNIQUE constraint failed: rooms.<column>`.
fn violated_key(err: &sqlx::Error) -> Option<UniqueKey> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if !db_err.is_unique_violation() {
        return None;
    }
    let message = db_err.message();
    if message.contains("rooms.room_name") {
        Some(UniqueKey::RoomName)
    } else if message.contains("rooms.token") {
        Some(UniqueKey::Token)
    } else if message.contains("rooms.verification_code") {
        Some(UniqueKey::VerificationCode)
    } else {
        None
    }
}

#[async_trait]
impl RoomStore for SqliteRoomStore {
    async fn insert(&self, room: NewRoom) -> Result<RoomRecord, StoreError> {
        let record = RoomRecord::stamped(room, self.clock.now());
        let participants = serde_json::to_string(&record.participants)
            .map_err(|e| StoreError::Backend(Box::new(e)))?;

        let result = sqlx::query(&format!(
            "INSERT INTO rooms ({ROOM_COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?)"
        ))
        .bind(record.id.to_string())
        .bind(&record.room_name)
        .bind(participants)
        .bind(&record.owner)
        .bind(&record.verification_code)
        .bind(&record.token)
        .bind(to_millis(record.token_expires_at))
        .bind(to_millis(record.created_at))
        .bind(to_millis(record.updated_at))
        .execute(&self.pool)
        .await;

        let err = match result {
            Ok(_) => return Ok(record),
            Err(err) => err,
        };
        match violated_key(&err) {
            Some(UniqueKey::RoomName) => Err(StoreError::Duplicate(UniqueKey::RoomName)),
            // SQLite names only the first failing constraint; a taken name wins.
            Some(key) => {
                if self.name_taken(&record.room_name).await? {
                    tracing::debug!(room = %record.room_name, ?key, "room name also taken");
                    Err(StoreError::Duplicate(UniqueKey::RoomName))
                } else {
                    Err(StoreError::Duplicate(key))
                }
            }
            None => Err(err.into()),
        }
    }

    async fn find_by_name(&self, room_name: &str) -> Result<Option<RoomRecord>, StoreError> {
        sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE room_name=?"))
            .bind(room_name)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| room_from_row(&row))
            .transpose()
    }

    async fn list_live_by_owner(
        &self,
        owner: &str,
        now: OffsetDateTime,
    ) -> Result<Vec<RoomRecord>, StoreError> {
        sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms \
             WHERE owner=? AND token <> '' AND token_expires_at > ? \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(owner)
        .bind(to_millis(now))
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(room_from_row)
        .collect()
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM rooms WHERE token_expires_at <= ?")
            .bind(to_millis(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use time::{macros::datetime, Duration};

    use super::*;
    use crate::util::clock::ManualClock;

    async fn store() -> (Arc<ManualClock>, SqliteRoomStore) {
        let clock = Arc::new(ManualClock::new(datetime!(2026-07-10 18:00 UTC)));
        let store = SqliteRoomStore::connect("sqlite::memory:", clock.clone())
            .await
            .unwrap();
        (clock, store)
    }

    fn new_room(name: &str, owner: &str, token: &str, expires_at: OffsetDateTime) -> NewRoom {
        NewRoom {
            id: Uuid::new_v4(),
            room_name: name.into(),
            participants: vec![owner.into(), "guest".into()],
            owner: owner.into(),
            verification_code: format!("vc-{name}"),
            token: token.into(),
            token_expires_at: expires_at,
        }
    }

    #[tokio::test]
    async fn round_trips_a_room() {
        let (_, store) = store().await;
        let inserted = store
            .insert(new_room("standup", "u1", "tok", datetime!(2026-07-11 18:00 UTC)))
            .await
            .unwrap();
        let found = store.find_by_name("standup").await.unwrap().unwrap();
        assert_eq!(found, inserted);
        assert!(store.find_by_name("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn maps_unique_violations_to_keys() {
        let (_, store) = store().await;
        let later = datetime!(2026-07-11 18:00 UTC);
        store.insert(new_room("a", "u1", "tok", later)).await.unwrap();

        let mut dup_name = new_room("a", "u1", "other", later);
        dup_name.verification_code = "vc-other".into();
        let err = store.insert(dup_name).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::RoomName)));

        let err = store.insert(new_room("b", "u1", "tok", later)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::Token)));

        let mut dup_code = new_room("c", "u1", "fresh", later);
        dup_code.verification_code = "vc-a".into();
        let err = store.insert(dup_code).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::VerificationCode)));
    }

    #[tokio::test]
    async fn taken_name_wins_over_other_collisions() {
        let (_, store) = store().await;
        let later = datetime!(2026-07-11 18:00 UTC);
        store.insert(new_room("a", "u1", "tok", later)).await.unwrap();

        // Same name, token and code all at once.
        let err = store.insert(new_room("a", "u2", "tok", later)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::RoomName)));

        // Same name and code, fresh token.
        let err = store.insert(new_room("a", "u2", "fresh", later)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::RoomName)));
    }

    #[tokio::test]
    async fn lists_and_purges_by_expiry() {
        let (clock, store) = store().await;
        let far = datetime!(2026-08-01 00:00 UTC);
        store.insert(new_room("old", "u1", "t1", far)).await.unwrap();
        clock.advance(Duration::seconds(5));
        store.insert(new_room("new", "u1", "t2", far)).await.unwrap();
        store
            .insert(new_room("brief", "u1", "t3", datetime!(2026-07-10 18:10 UTC)))
            .await
            .unwrap();
        store.insert(new_room("other", "u2", "t4", far)).await.unwrap();

        clock.advance(Duration::minutes(30));
        let listed: Vec<String> = store
            .list_live_by_owner("u1", clock.now())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.room_name)
            .collect();
        assert_eq!(listed, ["new", "old"]);

        assert_eq!(store.purge_expired(clock.now()).await.unwrap(), 1);
        assert!(store.find_by_name("brief").await.unwrap().is_none());
        assert!(store.find_by_name("old").await.unwrap().is_some());
    }
}
