//! TTL + idle-timeout session cache with lazy expiry and a background sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use secrecy::SecretString;
use tokio::task::JoinHandle;
use tracing::instrument;

use relay_core::errors::SessionError;
use relay_core::ids::SessionId;
use relay_core::security::{SessionToken, constant_time_eq};

use crate::clock::Clock;

/// One device-flow handshake in progress.
///
/// All timestamps are epoch milliseconds. `expires_at` is fixed at creation
/// (`created_at + ttl`) and never moves; `last_accessed_at` is refreshed on
/// every successful lookup and checked against the idle window. The store
/// owns the canonical record; callers only ever see owned snapshots.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    pub created_at: i64,
    pub last_accessed_at: i64,
    pub expires_at: i64,
    pub device_code: Option<String>,
    pub user_code: Option<String>,
    pub token: Option<SessionToken>,
    pub user_id: Option<String>,
}

/// Expiry and sweep tuning.
#[derive(Clone, Copy, Debug)]
pub struct SessionStoreConfig {
    /// Hard lifetime from creation. Never extended by access.
    pub ttl: Duration,
    /// Sliding window since the last successful lookup.
    pub idle_timeout: Duration,
    /// How often the background task evicts expired entries.
    pub sweep_interval: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(900),
            idle_timeout: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct Inner {
    sessions: Mutex<HashMap<SessionId, Session>>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
    idle_timeout_ms: i64,
}

impl Inner {
    fn is_expired(&self, session: &Session, now: i64) -> bool {
        now > session.expires_at || now - session.last_accessed_at > self.idle_timeout_ms
    }

    /// Look up `id` under an already-held lock, expire lazily, refresh the
    /// idle timer, apply `mutate`, and return an owned snapshot.
    ///
    /// Unknown, TTL-expired, and idle-expired ids all collapse to the same
    /// [`SessionError::NotFound`].
    fn entry_mut<F>(
        &self,
        sessions: &mut HashMap<SessionId, Session>,
        id: &SessionId,
        mutate: F,
    ) -> Result<Session, SessionError>
    where
        F: FnOnce(&mut Session),
    {
        let now = self.clock.now_ms();
        let Some(session) = sessions.get_mut(id) else {
            return Err(SessionError::NotFound);
        };
        if self.is_expired(session, now) {
            scrub(session);
            let _ = sessions.remove(id);
            counter!("relay_sessions_expired_total").increment(1);
            return Err(SessionError::NotFound);
        }
        session.last_accessed_at = now;
        mutate(session);
        Ok(session.clone())
    }

    fn with_valid<F>(&self, id: &SessionId, mutate: F) -> Result<Session, SessionError>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.sessions.lock();
        self.entry_mut(&mut sessions, id, mutate)
    }

    fn sweep(&self) {
        let mut sessions = self.sessions.lock();
        let now = self.clock.now_ms();
        let expired: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, session)| self.is_expired(session, now))
            .map(|(id, _)| id.clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        for id in &expired {
            if let Some(session) = sessions.get_mut(id) {
                scrub(session);
            }
            let _ = sessions.remove(id);
        }
        counter!("relay_sessions_swept_total").increment(expired.len() as u64);
        tracing::debug!(
            swept = expired.len(),
            remaining = sessions.len(),
            "evicted expired sessions"
        );
    }
}

/// Overwrite secret material in place before the entry is dropped.
///
/// Best-effort hygiene: the stored copy is blanked, but snapshots handed to
/// callers earlier are independent clones and are not reached from here.
fn scrub(session: &mut Session) {
    if let Some(token) = session.token.as_mut() {
        token.access_token = SecretString::from(String::new());
    }
    session.device_code = None;
    session.user_code = None;
}

/// In-memory cache of device-flow sessions.
///
/// Construction spawns an owned sweeper task on the ambient `tokio` runtime;
/// the task is aborted by [`SessionStore::destroy`] and on `Drop`. Lookups
/// also expire lazily, so a dead sweeper only delays reclamation, it never
/// resurrects a session.
pub struct SessionStore {
    inner: Arc<Inner>,
    sweeper: JoinHandle<()>,
}

impl SessionStore {
    /// Create a store and start its background sweeper.
    ///
    /// Must be called from within a `tokio` runtime.
    pub fn new(config: SessionStoreConfig, clock: Arc<dyn Clock>) -> Self {
        let inner = Arc::new(Inner {
            sessions: Mutex::new(HashMap::new()),
            clock,
            ttl_ms: duration_ms(config.ttl),
            idle_timeout_ms: duration_ms(config.idle_timeout),
        });
        let sweeper = spawn_sweeper(Arc::clone(&inner), config.sweep_interval);
        Self { inner, sweeper }
    }

    /// Mint a new session and return its id.
    #[instrument(skip(self))]
    pub fn create_session(&self) -> SessionId {
        let id = SessionId::new();
        let now = self.inner.clock.now_ms();
        let session = Session {
            id: id.clone(),
            created_at: now,
            last_accessed_at: now,
            expires_at: now + self.inner.ttl_ms,
            device_code: None,
            user_code: None,
            token: None,
            user_id: None,
        };
        let _ = self.inner.sessions.lock().insert(id.clone(), session);
        counter!("relay_sessions_created_total").increment(1);
        tracing::debug!(session_id = %id.redacted(), "session created");
        id
    }

    /// Fetch a snapshot of a live session, refreshing its idle timer.
    pub fn get_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.inner.with_valid(id, |_| {})
    }

    /// Fetch a session by comparing the candidate id against every stored id
    /// in constant time.
    ///
    /// Deliberately O(n): a hash lookup's timing depends on whether the key
    /// exists, and this is the path bearer credentials arrive on. Session
    /// counts are human-scale (device-flow logins), so the scan is cheap.
    pub fn validate_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        let mut sessions = self.inner.sessions.lock();
        let mut found = false;
        for key in sessions.keys() {
            found |= constant_time_eq(key.as_str().as_bytes(), id.as_str().as_bytes());
        }
        if !found {
            return Err(SessionError::NotFound);
        }
        self.inner.entry_mut(&mut sessions, id, |_| {})
    }

    /// Attach the device-flow codes to a live session.
    #[instrument(skip_all, fields(session_id = %id.redacted()))]
    pub fn bind_device_code(
        &self,
        id: &SessionId,
        device_code: impl Into<String>,
        user_code: impl Into<String>,
    ) -> Result<Session, SessionError> {
        let (device_code, user_code) = (device_code.into(), user_code.into());
        self.inner.with_valid(id, |session| {
            session.device_code = Some(device_code);
            session.user_code = Some(user_code);
        })
    }

    /// Store the exchanged token, then clear the device-flow codes.
    ///
    /// The codes are cleared unconditionally so a correlatable device code
    /// and a long-lived token never coexist on the record.
    #[instrument(skip_all, fields(session_id = %id.redacted()))]
    pub fn store_token(
        &self,
        id: &SessionId,
        token: SessionToken,
    ) -> Result<Session, SessionError> {
        self.inner.with_valid(id, |session| {
            session.token = Some(token);
            session.device_code = None;
            session.user_code = None;
        })
    }

    /// Record the authenticated user on a live session.
    #[instrument(skip_all, fields(session_id = %id.redacted()))]
    pub fn set_user_id(
        &self,
        id: &SessionId,
        user_id: impl Into<String>,
    ) -> Result<Session, SessionError> {
        let user_id = user_id.into();
        self.inner.with_valid(id, |session| {
            session.user_id = Some(user_id);
        })
    }

    /// Remove a session, scrubbing its token first. Double-delete is success.
    #[instrument(skip_all, fields(session_id = %id.redacted()))]
    pub fn delete_session(&self, id: &SessionId) {
        let mut sessions = self.inner.sessions.lock();
        if let Some(session) = sessions.get_mut(id) {
            scrub(session);
            let _ = sessions.remove(id);
            counter!("relay_sessions_deleted_total").increment(1);
            tracing::debug!("session deleted");
        }
    }

    /// Abort the sweeper, scrub every session, and empty the map.
    pub fn destroy(&self) {
        self.sweeper.abort();
        let mut sessions = self.inner.sessions.lock();
        for session in sessions.values_mut() {
            scrub(session);
        }
        let dropped = sessions.len();
        sessions.clear();
        tracing::debug!(dropped, "session store destroyed");
    }

    /// Number of stored sessions, expired entries included until reclaimed.
    pub fn len(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.lock().is_empty()
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

fn spawn_sweeper(inner: Arc<Inner>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick resolves immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            inner.sweep();
        }
    })
}

fn duration_ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
