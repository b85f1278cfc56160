//! Sessions and the backend adapter contract
//!
//! Adding a backend means implementing two traits:
//!
//! - [`Connector`] turns a URI and a [`Credential`] into a live connection.
//! - [`Connection`] performs the per-path operations. Every method defaults to
//!   [`Error::UnsupportedOperation`], so a backend only implements what it can do.
//!
//! A [`Session`] wraps one connector and one credential, establishes the
//! connection lazily on first use and hands out [`Resource`]s.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use crate::credential::Credential;
use crate::drain::Sink;
use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::resource::Resource;
use crate::stat::Stat;
use crate::tap::RangeReader;

/// Backend capability flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The backend tolerates the next slice being read while the previous one
    /// is still being appended
    pub parallel_append: bool,
}

/// Factory for live connections to one kind of backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Backend kind, reported in [`Error::AuthenticationRequired`]
    fn kind(&self) -> &'static str;

    /// URI schemes this backend serves
    fn schemes(&self) -> &'static [&'static str];

    /// Establish a connection
    ///
    /// Must fail with [`Error::AuthenticationRequired`] when the credential
    /// variant is not one the backend accepts.
    async fn connect(&self, uri: &Url, credential: &Credential) -> Result<Arc<dyn Connection>>;
}

/// A live, authenticated backend handle
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connection: Send + Sync {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Enumerate a directory one level deep
    ///
    /// Returns [`Error::NotADirectory`] when the path exists but is a file and
    /// [`Error::NotFound`] when it does not exist.
    async fn read_dir(&self, _path: &ResourcePath) -> Result<Vec<Stat>> {
        Err(Error::unsupported("list"))
    }

    /// Fetch single-path metadata
    async fn metadata(&self, _path: &ResourcePath) -> Result<Stat> {
        Err(Error::unsupported("stat"))
    }

    async fn mkdir(&self, _path: &ResourcePath) -> Result<()> {
        Err(Error::unsupported("mkdir"))
    }

    /// Remove a path, recursively for directories
    async fn delete(&self, _path: &ResourcePath) -> Result<()> {
        Err(Error::unsupported("delete"))
    }

    async fn reader(&self, _path: &ResourcePath) -> Result<Box<dyn RangeReader>> {
        Err(Error::unsupported("tap"))
    }

    async fn writer(&self, _path: &ResourcePath) -> Result<Box<dyn Sink>> {
        Err(Error::unsupported("sink"))
    }
}

/// Opaque session identifier; equal ids mean the same established connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session's connection
#[derive(Clone)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready(Arc<dyn Connection>),
    Failed(String),
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => f.write_str("Uninitialized"),
            SessionState::Initializing => f.write_str("Initializing"),
            SessionState::Ready(_) => f.write_str("Ready"),
            SessionState::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

struct SessionInner {
    id: SessionId,
    uri: Url,
    credential: Credential,
    connector: Arc<dyn Connector>,
    state: Mutex<SessionState>,
}

/// Authenticated connection context bound to one backend and one credential
///
/// Cloning is cheap and clones share the same connection and id.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.connector.kind())
            .field("uri", &self.inner.uri.as_str())
            .finish()
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Session {}

impl Session {
    /// Create an uninitialized session; no I/O happens here
    pub fn new(connector: Arc<dyn Connector>, uri: Url, credential: Credential) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: SessionId(uuid::Uuid::new_v4()),
                uri,
                credential,
                connector,
                state: Mutex::new(SessionState::Uninitialized),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn kind(&self) -> &'static str {
        self.inner.connector.kind()
    }

    pub fn uri(&self) -> &Url {
        &self.inner.uri
    }

    pub fn credential(&self) -> &Credential {
        &self.inner.credential
    }

    /// Whether both handles reference the same established connection
    pub fn is_equivalent(&self, other: &Session) -> bool {
        self == other
    }

    /// Snapshot of the current lifecycle state
    pub async fn state(&self) -> SessionState {
        self.inner.state.lock().await.clone()
    }

    /// Establish the connection if needed and return it
    ///
    /// Idempotent: once Ready the cached connection is returned. Concurrent
    /// callers wait on the same attempt. A failed session may be retried.
    pub async fn initialize(&self) -> Result<Arc<dyn Connection>> {
        let mut state = self.inner.state.lock().await;
        if let SessionState::Ready(connection) = &*state {
            return Ok(connection.clone());
        }

        *state = SessionState::Initializing;
        tracing::debug!(
            session = %self.inner.id,
            kind = self.kind(),
            uri = %self.inner.uri,
            "initializing session"
        );

        match self
            .inner
            .connector
            .connect(&self.inner.uri, &self.inner.credential)
            .await
        {
            Ok(connection) => {
                *state = SessionState::Ready(connection.clone());
                Ok(connection)
            }
            Err(e) => {
                tracing::warn!(session = %self.inner.id, error = %e, "session failed to initialize");
                *state = SessionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Select a path inside this session (no I/O)
    pub fn select(&self, path: &str) -> Resource {
        Resource::new(self.clone(), ResourcePath::new(path))
    }

    /// Select the session root
    pub fn root(&self) -> Resource {
        Resource::new(self.clone(), ResourcePath::root())
    }
}
