//! Resources: path handles inside a session
//!
//! A [`Resource`] is an immutable (session, path) pair. Constructing or
//! selecting one performs no I/O; every operation first makes sure the
//! session is initialized and then delegates to the backend connection.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::drain::Drain;
use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::session::{Capabilities, Connection, Session};
use crate::stat::Stat;
use crate::tap::Tap;

/// Handle to one path inside one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    session: Session,
    path: ResourcePath,
}

impl Resource {
    pub(crate) fn new(session: Session, path: ResourcePath) -> Self {
        Self { session, path }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Select a path relative to this one (absolute paths replace it)
    pub fn select(&self, path: &str) -> Resource {
        Resource::new(self.session.clone(), self.path.join(path))
    }

    /// Initialize the session and return the live connection
    pub async fn initialize(&self) -> Result<Arc<dyn Connection>> {
        self.session.initialize().await
    }

    pub async fn capabilities(&self) -> Result<Capabilities> {
        Ok(self.initialize().await?.capabilities())
    }

    /// Fetch metadata, with one level of children for directories
    ///
    /// The path is enumerated as a directory first; only when the backend
    /// answers that it is not one is single-path metadata fetched. The root is
    /// always a directory. Enumeration reports children only, so a directory's
    /// own `time` is 0 (unknown); its children carry their backend times.
    pub async fn stat(&self) -> Result<Stat> {
        let connection = self.initialize().await?;

        match connection.read_dir(&self.path).await {
            Ok(children) => Ok(Stat::directory(self.path.name(), 0).with_children(children)),
            Err(Error::NotADirectory(_)) if self.path.is_root() => {
                Ok(Stat::directory("/", 0).with_children(Vec::new()))
            }
            Err(Error::NotADirectory(_)) => connection.metadata(&self.path).await,
            Err(e) => Err(e),
        }
    }

    /// Lazily list the names of immediate children
    ///
    /// Nothing is requested from the backend until the stream is polled.
    pub fn list(&self) -> BoxStream<'static, Result<String>> {
        let resource = self.clone();
        stream::once(async move {
            let connection = resource.initialize().await?;
            let entries = match connection.read_dir(&resource.path).await {
                Err(Error::NotADirectory(path)) => {
                    return Err(Error::InvalidPath(format!("{path} is not a directory")));
                }
                other => other?,
            };
            let names = entries.into_iter().map(|stat| Ok::<_, Error>(stat.name));
            Ok::<_, Error>(stream::iter(names))
        })
        .try_flatten()
        .boxed()
    }

    /// Create this path (and missing parents where the backend allows)
    pub async fn mkdir(&self) -> Result<Resource> {
        let connection = self.initialize().await?;
        connection.mkdir(&self.path).await?;
        tracing::debug!(path = %self.path, "created directory");
        Ok(self.clone())
    }

    /// Remove this path, recursively for directories
    pub async fn delete(&self) -> Result<Resource> {
        if self.path.is_root() {
            return Err(Error::InvalidPath("refusing to delete the root".into()));
        }
        let connection = self.initialize().await?;
        connection.delete(&self.path).await?;
        tracing::debug!(path = %self.path, "deleted");
        Ok(self.clone())
    }

    /// Open a tap over the current content, `slice_size` bytes per slice
    ///
    /// The total size is fixed here by a single-path metadata lookup.
    pub async fn tap(&self, slice_size: u64) -> Result<Tap> {
        let connection = self.initialize().await?;
        let stat = connection.metadata(&self.path).await?;
        if !stat.is_file() {
            return Err(Error::InvalidPath(format!(
                "{} is a directory and cannot be tapped",
                self.path
            )));
        }
        let reader = connection.reader(&self.path).await?;
        Tap::new(reader, stat.size, slice_size)
    }

    /// Open a drain writing to this path; it still has to be started
    pub async fn sink(&self) -> Result<Drain> {
        let connection = self.initialize().await?;
        let sink = connection.writer(&self.path).await?;
        Ok(Drain::new(sink))
    }

    /// Re-resolve this path under an equivalent session
    pub fn reselect_on(&self, session: &Session) -> Result<Resource> {
        if !self.session.is_equivalent(session) {
            return Err(Error::InvalidReselect);
        }
        Ok(session.select(self.path.as_str()))
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.session.kind(), self.path)
    }
}
