use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use anyhow::Result;
use tracing::{debug, info, warn};

use super::TokenStorage;

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Registered session-expired callbacks, kept in registration order.
#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Callback)>>,
}

impl Subscribers {
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Callback)>> {
        // A poisoned list is still a valid list; callbacks never run under the lock.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|(entry_id, _)| *entry_id != id);
    }
}

/// What the store knows about the token without asking storage.
enum Cached {
    /// Storage has not been read yet
    Unloaded,
    /// Known to have no token; storage is not consulted again until `set_token`
    Cleared,
    Token(String),
}

struct TokenState {
    cached: Cached,
    /// Bumped by every `set_token` and `clear_session`
    generation: u64,
}

/// Owner of the current bearer token.
///
/// Holds an in-memory copy of the token mirrored to durable storage, and is
/// the only place a session can be declared dead. Share it behind an `Arc`
/// between the API client and whatever needs to react to expiry.
pub struct SessionStore {
    storage: Box<dyn TokenStorage>,
    state: Mutex<TokenState>,
    subscribers: Arc<Subscribers>,
}

impl SessionStore {
    pub fn new(storage: impl TokenStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            state: Mutex::new(TokenState {
                cached: Cached::Unloaded,
                generation: 0,
            }),
            subscribers: Arc::new(Subscribers::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current token, loading it from durable storage on first use.
    ///
    /// A storage read failure is logged and reported as no token.
    pub fn get_token(&self) -> Option<String> {
        let generation = {
            let state = self.state();
            match &state.cached {
                Cached::Token(token) => return Some(token.clone()),
                Cached::Cleared => return None,
                Cached::Unloaded => state.generation,
            }
        };

        let loaded = match self.storage.load() {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Failed to read stored token");
                None
            }
        };

        let mut state = self.state();
        // A set_token or clear_session that landed during the read wins.
        if state.generation == generation {
            match loaded {
                Some(Some(token)) => state.cached = Cached::Token(token),
                Some(None) => state.cached = Cached::Cleared,
                None => {}
            }
        }
        match &state.cached {
            Cached::Token(token) => Some(token.clone()),
            _ => None,
        }
    }

    /// Persist a new token, then make it the cached one.
    ///
    /// The cache is only updated once the durable write succeeded.
    pub fn set_token(&self, token: &str) -> Result<()> {
        let mut state = self.state();
        self.storage.store(token)?;
        state.cached = Cached::Token(token.to_string());
        state.generation += 1;
        debug!("Session token updated");
        Ok(())
    }

    /// Drop the token everywhere and notify every subscriber.
    ///
    /// The store reports no token afterwards even if the durable delete
    /// fails.
    pub fn clear_session(&self) {
        {
            let mut state = self.state();
            state.cached = Cached::Cleared;
            state.generation += 1;
            if let Err(e) = self.storage.delete() {
                warn!(error = %format!("{:#}", e), "Failed to delete stored token");
            }
        }
        info!("Session cleared");

        let snapshot: Vec<(u64, Callback)> = self.subscribers.lock().clone();
        for (id, callback) in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                warn!(subscriber = id, "Session-expired subscriber panicked");
            }
        }
    }

    /// Register a callback fired on every `clear_session`.
    pub fn on_session_expired<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push((id, Arc::new(callback)));
        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Handle returned by [`SessionStore::on_session_expired`].
///
/// Dropping it keeps the callback registered; call `unsubscribe` to remove it.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    subscribers: Weak<Subscribers>,
}

impl Subscription {
    /// Remove this registration. Calling it again does nothing.
    pub fn unsubscribe(&self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.remove(self.id);
        }
    }
}
