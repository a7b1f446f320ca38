//! Session Store
//!
//! In-memory map from an opaque session id (carried in the `sid` cookie) to
//! the state of one browser: its current [`Filter`], the CSRF token issued
//! with its page, the push channel currently attached to it and the time it
//! expires.
//!
//! Every successful [`SessionStore::fetch`] pushes the expiry forward by the
//! configured TTL. Expired entries are removed by [`SessionStore::sweep`]
//! (run periodically by [`SessionStore::spawn_sweeper`]) and are also
//! treated as absent if read before the sweep reaches them.
//!
//! Filter changes are published on a per-session `watch` channel. At most
//! one push channel is attached at a time; attaching a new one closes the
//! previous one.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::csrf;
use crate::models::Filter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
}

/// Point-in-time view of a session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub filter: Filter,
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
    pub has_channel: bool,
}

/// Handed to a push channel when it attaches.
///
/// `filter` yields every filter change for the session. `closed` resolves
/// once the channel is superseded by a newer attach or the session is
/// evicted.
#[derive(Debug)]
pub struct ChannelAttachment {
    pub channel_id: Uuid,
    pub filter: watch::Receiver<Filter>,
    pub closed: oneshot::Receiver<()>,
}

struct ChannelSlot {
    id: Uuid,
    // Dropping the sender resolves the attached channel's `closed` receiver.
    _close: oneshot::Sender<()>,
}

struct SessionEntry {
    filter: watch::Sender<Filter>,
    csrf_token: String,
    channel: Option<ChannelSlot>,
    expires_at: DateTime<Utc>,
}

impl SessionEntry {
    fn snapshot(&self, id: &str) -> Session {
        Session {
            id: id.to_string(),
            filter: self.filter.borrow().clone(),
            csrf_token: self.csrf_token.clone(),
            expires_at: self.expires_at,
            has_channel: self.channel.is_some(),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, SessionEntry>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a session with an empty filter and a fresh CSRF token.
    pub async fn create(&self) -> Session {
        let id = Uuid::new_v4().to_string();
        let (filter, _) = watch::channel(Filter::default());
        let entry = SessionEntry {
            filter,
            csrf_token: csrf::generate_token(),
            channel: None,
            expires_at: self.clock.now() + self.ttl,
        };
        let session = entry.snapshot(&id);

        self.inner.write().await.insert(id.clone(), entry);
        debug!(session_id = %id, "Session created");
        session
    }

    /// Look up a session and extend its life. Expired sessions are dropped
    /// and reported as absent.
    pub async fn fetch(&self, id: &str) -> Option<Session> {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;

        let expired = guard.get(id)?.expires_at <= now;
        if expired {
            guard.remove(id);
            debug!(session_id = %id, "Session expired on read");
            return None;
        }

        let entry = guard.get_mut(id)?;
        entry.expires_at = now + self.ttl;
        Some(entry.snapshot(id))
    }

    /// Replace the session's filter and notify its push channel.
    pub async fn update_filter(&self, id: &str, filter: Filter) -> Result<(), SessionError> {
        let guard = self.inner.read().await;
        let entry = guard
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        debug!(session_id = %id, query = %filter.query, tags = filter.tags.len(), "Filter updated");
        entry.filter.send_replace(filter);
        Ok(())
    }

    /// Attach a push channel, closing whichever channel was attached before.
    pub async fn attach_channel(&self, id: &str) -> Result<ChannelAttachment, SessionError> {
        let mut guard = self.inner.write().await;
        let entry = guard
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let channel_id = Uuid::new_v4();
        let (close_tx, close_rx) = oneshot::channel();
        if let Some(previous) = entry.channel.replace(ChannelSlot {
            id: channel_id,
            _close: close_tx,
        }) {
            debug!(session_id = %id, previous = %previous.id, "Replacing push channel");
        }

        Ok(ChannelAttachment {
            channel_id,
            filter: entry.filter.subscribe(),
            closed: close_rx,
        })
    }

    /// Clear the channel slot if it still holds `channel_id`.
    pub async fn detach_channel(&self, id: &str, channel_id: Uuid) -> bool {
        let mut guard = self.inner.write().await;
        match guard.get_mut(id) {
            Some(entry) if entry.channel.as_ref().is_some_and(|c| c.id == channel_id) => {
                entry.channel = None;
                debug!(session_id = %id, channel_id = %channel_id, "Push channel detached");
                true
            }
            _ => false,
        }
    }

    /// Extend the session's life without reading it.
    pub async fn touch(&self, id: &str) -> bool {
        let expires_at = self.clock.now() + self.ttl;
        match self.inner.write().await.get_mut(id) {
            Some(entry) => {
                entry.expires_at = expires_at;
                true
            }
            None => false,
        }
    }

    /// Evict every expired session, closing its push channel. Returns the
    /// number of sessions removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, entry| entry.expires_at > now);
        before - guard.len()
    }

    /// Run [`sweep`](Self::sweep) every `period` until the runtime shuts down.
    pub fn spawn_sweeper(&self, period: std::time::Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let evicted = store.sweep().await;
                if evicted > 0 {
                    let remaining = store.len().await;
                    info!(evicted, remaining, "Expired sessions swept");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_clock() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = SessionStore::with_clock(Duration::hours(1), clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let (store, _) = store_with_clock();
        let created = store.create().await;

        let fetched = store.fetch(&created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert!(fetched.filter.is_empty());
        assert_eq!(fetched.csrf_token, created.csrf_token);
        assert!(!fetched.has_channel);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (store, _) = store_with_clock();
        let a = store.create().await;
        let b = store.create().await;
        assert_ne!(a.id, b.id);
        assert_ne!(a.csrf_token, b.csrf_token);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_fetch_unknown_is_none() {
        let (store, _) = store_with_clock();
        assert!(store.fetch("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_extends_expiry() {
        let (store, clock) = store_with_clock();
        let created = store.create().await;

        clock.advance(Duration::minutes(50));
        let fetched = store.fetch(&created.id).await.unwrap();
        assert_eq!(fetched.expires_at, clock.now() + Duration::hours(1));

        // 100 minutes after creation, but only 50 since the last read.
        clock.advance(Duration::minutes(50));
        assert_eq!(store.sweep().await, 0);
        assert!(store.fetch(&created.id).await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_evicts_inactive_sessions() {
        let (store, clock) = store_with_clock();
        let idle = store.create().await;
        clock.advance(Duration::minutes(30));
        let active = store.create().await;

        clock.advance(Duration::minutes(31));
        assert_eq!(store.sweep().await, 1);
        assert!(store.fetch(&idle.id).await.is_none());
        assert!(store.fetch(&active.id).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_session_absent_before_sweep() {
        let (store, clock) = store_with_clock();
        let created = store.create().await;

        clock.advance(Duration::hours(2));
        assert!(store.fetch(&created.id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_filter_notifies_subscriber() {
        let (store, _) = store_with_clock();
        let session = store.create().await;
        let mut attachment = store.attach_channel(&session.id).await.unwrap();

        let filter = Filter::new("go", ["Remote"]);
        store.update_filter(&session.id, filter.clone()).await.unwrap();

        attachment.filter.changed().await.unwrap();
        assert_eq!(*attachment.filter.borrow_and_update(), filter);
        assert_eq!(store.fetch(&session.id).await.unwrap().filter, filter);
    }

    #[tokio::test]
    async fn test_update_filter_unknown_session() {
        let (store, _) = store_with_clock();
        let err = store
            .update_filter("missing", Filter::default())
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::NotFound("missing".to_string()));
        assert!(store.attach_channel("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_last_attach_wins() {
        let (store, _) = store_with_clock();
        let session = store.create().await;

        let first = store.attach_channel(&session.id).await.unwrap();
        let second = store.attach_channel(&session.id).await.unwrap();

        // The first channel's close signal fires once it is replaced.
        assert!(first.closed.await.is_err());
        assert!(!store.detach_channel(&session.id, first.channel_id).await);
        assert!(store.fetch(&session.id).await.unwrap().has_channel);

        assert!(store.detach_channel(&session.id, second.channel_id).await);
        assert!(!store.fetch(&session.id).await.unwrap().has_channel);
    }

    #[tokio::test]
    async fn test_sweep_closes_attached_channel() {
        let (store, clock) = store_with_clock();
        let session = store.create().await;
        let attachment = store.attach_channel(&session.id).await.unwrap();

        clock.advance(Duration::hours(2));
        assert_eq!(store.sweep().await, 1);
        assert!(attachment.closed.await.is_err());
    }

    #[tokio::test]
    async fn test_touch_extends_expiry() {
        let (store, clock) = store_with_clock();
        let session = store.create().await;

        clock.advance(Duration::minutes(59));
        assert!(store.touch(&session.id).await);
        clock.advance(Duration::minutes(59));
        assert_eq!(store.sweep().await, 0);
        assert!(!store.touch("missing").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_runs_periodically() {
        let (store, clock) = store_with_clock();
        let session = store.create().await;
        let handle = store.spawn_sweeper(std::time::Duration::from_secs(900));

        clock.advance(Duration::hours(2));
        tokio::time::sleep(std::time::Duration::from_secs(901)).await;

        assert!(store.is_empty().await);
        assert!(store.fetch(&session.id).await.is_none());
        handle.abort();
    }
}
