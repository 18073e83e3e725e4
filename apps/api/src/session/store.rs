use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use super::ReviewSession;

const KEY_PREFIX: &str = "tailor:session";
/// Optimistic-lock retries before an update gives up with `Conflict`.
const MAX_UPDATE_ATTEMPTS: usize = 8;

/// A change to a stored session. Returns whether the session was modified
/// and must be written back. May run more than once when the store retries.
pub type Mutation<'a> = &'a mut (dyn FnMut(&mut ReviewSession) -> bool + Send);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("stored session is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("session {0} kept changing; update abandoned")]
    Conflict(Uuid),
}

/// Persistence for review sessions.
///
/// Ticket issuance is atomic per session so concurrent requests never share
/// a sequence number. Every change to an existing session goes through
/// `update`, which applies the mutation to the latest stored state and writes
/// it back with no other write in between.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Result<Option<ReviewSession>, StoreError>;

    /// Stores a new session, or overwrites one unconditionally.
    async fn save(&self, session: &ReviewSession) -> Result<(), StoreError>;

    /// Applies `mutation` atomically. Returns the resulting session, or `None`
    /// when `id` is unknown.
    async fn update(
        &self,
        id: Uuid,
        mutation: Mutation<'_>,
    ) -> Result<Option<ReviewSession>, StoreError>;

    /// Returns whether a session was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Next request sequence number for `id`, starting at 1.
    async fn next_ticket(&self, id: Uuid) -> Result<u64, StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Process-local store used when no `REDIS_URL` is configured. Sessions live
/// until deleted or the process exits.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, ReviewSession>>,
    tickets: Mutex<HashMap<Uuid, u64>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: Uuid) -> Result<Option<ReviewSession>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn save(&self, session: &ReviewSession) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn update(
        &self,
        id: Uuid,
        mutation: Mutation<'_>,
    ) -> Result<Option<ReviewSession>, StoreError> {
        let mut sessions = self.sessions.write().await;
        let Some(stored) = sessions.get(&id) else {
            return Ok(None);
        };
        let mut session = stored.clone();
        if mutation(&mut session) {
            sessions.insert(id, session.clone());
        }
        Ok(Some(session))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.tickets.lock().await.remove(&id);
        Ok(self.sessions.write().await.remove(&id).is_some())
    }

    async fn next_ticket(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut tickets = self.tickets.lock().await;
        let seq = tickets.entry(id).or_insert(0);
        *seq += 1;
        Ok(*seq)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

/// Sessions as JSON strings under `tailor:session:{id}` with a sliding TTL.
pub struct RedisSessionStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSessionStore {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    /// A new connection per call, so a `WATCH` is never shared with other requests.
    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

async fn get_session(
    conn: &mut redis::aio::MultiplexedConnection,
    id: Uuid,
) -> Result<Option<ReviewSession>, StoreError> {
    let raw: Option<String> = redis::cmd("GET")
        .arg(session_key(id))
        .query_async(conn)
        .await?;
    raw.map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(StoreError::from)
}

fn session_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}:{id}")
}

fn ticket_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}:{id}:seq")
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, id: Uuid) -> Result<Option<ReviewSession>, StoreError> {
        let mut conn = self.connection().await?;
        get_session(&mut conn, id).await
    }

    async fn save(&self, session: &ReviewSession) -> Result<(), StoreError> {
        let json = serde_json::to_string(session)?;
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(session_key(session.id))
            .arg(json)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// `WATCH` the key, mutate a fresh copy, then `MULTI`/`EXEC`. A write by
    /// anyone else in between aborts the transaction and the mutation reruns.
    async fn update(
        &self,
        id: Uuid,
        mutation: Mutation<'_>,
    ) -> Result<Option<ReviewSession>, StoreError> {
        let key = session_key(id);
        let mut conn = self.connection().await?;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            redis::cmd("WATCH")
                .arg(&key)
                .query_async::<_, ()>(&mut conn)
                .await?;

            let Some(mut session) = get_session(&mut conn, id).await? else {
                redis::cmd("UNWATCH").query_async::<_, ()>(&mut conn).await?;
                return Ok(None);
            };
            if !mutation(&mut session) {
                redis::cmd("UNWATCH").query_async::<_, ()>(&mut conn).await?;
                return Ok(Some(session));
            }

            let json = serde_json::to_string(&session)?;
            let committed: Option<()> = redis::pipe()
                .atomic()
                .cmd("SET")
                .arg(&key)
                .arg(json)
                .arg("EX")
                .arg(self.ttl_secs)
                .ignore()
                .query_async(&mut conn)
                .await?;
            if committed.is_some() {
                return Ok(Some(session));
            }
            debug!("Session {id} changed during update (attempt {attempt}), retrying");
        }

        warn!("Giving up on session {id} after {MAX_UPDATE_ATTEMPTS} conflicting updates");
        Err(StoreError::Conflict(id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let removed: i64 = redis::cmd("DEL")
            .arg(session_key(id))
            .arg(ticket_key(id))
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn next_ticket(&self, id: Uuid) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let key = ticket_key(id);
        let seq: u64 = redis::cmd("INCR").arg(&key).query_async(&mut conn).await?;
        redis::cmd("EXPIRE")
            .arg(&key)
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(seq)
    }
}
