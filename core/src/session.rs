//! The session table: the one shared mutable structure on the server side.
//!
//! Grounded on `crates/service/src/session/mod.rs`'s `SessionManager` (an
//! `ahash`-backed table behind a lock, with a background reaper) and on
//! `turn-server/src/router.rs`'s choice of `tokio::sync::Mutex` rather than
//! `parking_lot` for a table whose lookup path needs to `.await` a dial
//! while holding the lock.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;

/// Anything a session can relay bytes to and from.
pub trait Downstream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Downstream for T {}

/// One logical client stream: an open downstream connection plus the last
/// time it was touched by a POST.
///
/// `downstream` carries its own lock so that a single session's transact
/// calls serialize against each other even if a misbehaving client issues
/// overlapping POSTs for the same id (spec.md §5, §9's recommended
/// per-session lock). `last_seen` is a plain field mutated only while the
/// table's own lock is held, matching spec.md §3's invariant that removal
/// and the staleness check happen atomically under the table lock.
pub struct Session<D> {
    downstream: AsyncMutex<D>,
    last_seen: parking_lot::Mutex<Instant>,
}

impl<D: Downstream> Session<D> {
    fn new(downstream: D) -> Self {
        Self {
            downstream: AsyncMutex::new(downstream),
            last_seen: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Lock the downstream connection for the duration of one transact call.
    pub async fn downstream(&self) -> tokio::sync::MutexGuard<'_, D> {
        self.downstream.lock().await
    }

    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    fn is_stale(&self, staleness: Duration) -> bool {
        self.last_seen.lock().elapsed() > staleness
    }
}

/// Maps session id -> `Session`. At most one session per id at any instant;
/// no session is ever resurrected once removed.
pub struct SessionTable<D> {
    sessions: AsyncMutex<AHashMap<String, Arc<Session<D>>>>,
}

impl<D: Downstream> Default for SessionTable<D> {
    fn default() -> Self {
        Self {
            sessions: AsyncMutex::new(AHashMap::new()),
        }
    }
}

impl<D: Downstream> SessionTable<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `id`, or dial a fresh downstream connection and insert it if
    /// this is the first POST for that id. Touches `last_seen` either way.
    ///
    /// The table lock is held across `dial`, per spec.md §4.2 option (a):
    /// the simplest strategy that still guarantees a single winning session
    /// per id under concurrent POSTs. `dial` is only invoked when no session
    /// for `id` exists yet.
    pub async fn get_or_create<F, Fut, E>(
        &self,
        id: &str,
        dial: F,
    ) -> Result<Arc<Session<D>>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<D, E>>,
    {
        let mut sessions = self.sessions.lock().await;

        if let Some(session) = sessions.get(id) {
            session.touch();
            return Ok(session.clone());
        }

        let downstream = dial().await?;
        let session = Arc::new(Session::new(downstream));
        session.touch();
        sessions.insert(id.to_string(), session.clone());
        Ok(session)
    }

    /// Remove and return a session, e.g. after a failed transact. Dropping
    /// the returned `Arc` (once no transact still holds it) closes the
    /// downstream connection.
    pub async fn remove(&self, id: &str) -> Option<Arc<Session<D>>> {
        self.sessions.lock().await.remove(id)
    }

    /// Remove every session whose `last_seen` is older than `staleness`.
    /// Returns how many were reaped, for logging.
    pub async fn sweep(&self, staleness: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_stale(staleness))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            sessions.remove(id);
        }

        stale.len()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Spawn the background sweeper described in spec.md §4.4: wake every
/// `period`, reap sessions older than `staleness`. Runs until the table is
/// dropped (the weak-equivalent here is simply an `Arc` the caller keeps
/// alive for the process lifetime, matching `server_main` threading
/// `Arc<Config>`/`Arc<Service>` through the teacher's startup path).
pub fn spawn_sweeper<D: Downstream>(
    table: Arc<SessionTable<D>>,
    staleness: Duration,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let reaped = table.sweep(staleness).await;
            if reaped > 0 {
                log::debug!("session sweep reaped {reaped} stale session(s)");
            }
        }
    })
}
