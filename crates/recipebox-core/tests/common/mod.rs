#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use recipebox_core::{ApiClient, ClientConfig, MemoryStorage, SessionStore, TokenStorage};
use wiremock::{MockServer, Request};

pub struct Harness {
    pub server: MockServer,
    pub client: ApiClient,
    pub storage: MemoryStorage,
    expired: Arc<AtomicUsize>,
}

/// Token slot that can be read and cleared but refuses new tokens.
pub struct ReadOnlyStorage(pub MemoryStorage);

impl TokenStorage for ReadOnlyStorage {
    fn load(&self) -> anyhow::Result<Option<String>> {
        self.0.load()
    }
    fn store(&self, _token: &str) -> anyhow::Result<()> {
        anyhow::bail!("keychain is read-only")
    }
    fn delete(&self) -> anyhow::Result<()> {
        self.0.delete()
    }
}

#[derive(Default)]
pub struct Options {
    pub timeout: Option<Duration>,
    pub read_only_storage: bool,
}

impl Harness {
    /// Mock backend plus a client whose durable slot starts with `token`.
    pub async fn start(token: Option<&str>) -> Self {
        Self::start_with(token, Options::default()).await
    }

    pub async fn start_with(token: Option<&str>, options: Options) -> Self {
        let server = MockServer::start().await;
        let storage = match token {
            Some(token) => MemoryStorage::with_token(token),
            None => MemoryStorage::new(),
        };
        let session = if options.read_only_storage {
            Arc::new(SessionStore::new(ReadOnlyStorage(storage.clone())))
        } else {
            Arc::new(SessionStore::new(storage.clone()))
        };

        let expired = Arc::new(AtomicUsize::new(0));
        let counter = expired.clone();
        session.on_session_expired(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut config = ClientConfig::new(server.uri());
        if let Some(timeout) = options.timeout {
            config = config.with_timeout(timeout);
        }
        let client = ApiClient::new(config, session).expect("failed to build client");

        Self {
            server,
            client,
            storage,
            expired,
        }
    }

    /// How many times the session-expired subscriber fired.
    pub fn expired_count(&self) -> usize {
        self.expired.load(Ordering::SeqCst)
    }

    pub async fn requests_to(&self, path: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == path)
            .collect()
    }
}
