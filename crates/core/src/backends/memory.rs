//! In-memory backend (`mem://`)
//!
//! Keeps a tree of files and directories in process memory. Uploads behave like
//! cursor-based upload sessions: bytes are staged per upload id, appends must
//! land exactly at the staged length, and nothing becomes visible until commit.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::credential::{Credential, CredentialKind};
use crate::drain::{Sink, UploadCursor};
use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::session::{Capabilities, Connection, Connector};
use crate::slice::Slice;
use crate::stat::Stat;
use crate::tap::RangeReader;

#[derive(Debug, Clone)]
enum Node {
    File { data: Bytes, time: i64 },
    Directory { time: i64 },
}

impl Node {
    fn stat(&self, name: &str) -> Stat {
        match self {
            Node::File { data, time } => Stat::file(name, data.len() as u64, *time),
            Node::Directory { time } => Stat::directory(name, *time),
        }
    }
}

fn now() -> i64 {
    jiff::Timestamp::now().as_second()
}

/// Shared in-memory file tree
#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<ResourcePath, Node>>,
    uploads: Mutex<HashMap<String, BytesMut>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Write a file, creating missing parent directories
    pub async fn put_file(&self, path: &str, data: impl Into<Bytes>) -> Result<()> {
        let path = ResourcePath::new(path);
        let mut nodes = self.nodes.write().await;
        create_parents(&mut nodes, &path)?;
        if let Some(Node::Directory { .. }) = nodes.get(&path) {
            return Err(Error::InvalidPath(format!("{path} is a directory")));
        }
        nodes.insert(
            path,
            Node::File {
                data: data.into(),
                time: now(),
            },
        );
        Ok(())
    }

    /// Create a directory and its missing parents
    pub async fn create_dir(&self, path: &str) -> Result<()> {
        let path = ResourcePath::new(path);
        let mut nodes = self.nodes.write().await;
        create_dir_all(&mut nodes, &path)
    }

    /// Content of a committed file
    pub async fn read_file(&self, path: &str) -> Option<Bytes> {
        match self.nodes.read().await.get(&ResourcePath::new(path)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub async fn exists(&self, path: &str) -> bool {
        let path = ResourcePath::new(path);
        path.is_root() || self.nodes.read().await.contains_key(&path)
    }

    /// Number of upload sessions opened but never committed
    pub async fn pending_uploads(&self) -> usize {
        self.uploads.lock().await.len()
    }
}

fn create_parents(nodes: &mut BTreeMap<ResourcePath, Node>, path: &ResourcePath) -> Result<()> {
    match path.parent() {
        Some(parent) => create_dir_all(nodes, &parent),
        None => Ok(()),
    }
}

fn create_dir_all(nodes: &mut BTreeMap<ResourcePath, Node>, path: &ResourcePath) -> Result<()> {
    if path.is_root() {
        return Ok(());
    }
    create_parents(nodes, path)?;
    match nodes.get(path) {
        Some(Node::Directory { .. }) => Ok(()),
        Some(Node::File { .. }) => Err(Error::InvalidPath(format!("{path} exists and is a file"))),
        None => {
            nodes.insert(path.clone(), Node::Directory { time: now() });
            Ok(())
        }
    }
}

fn is_descendant(candidate: &ResourcePath, ancestor: &ResourcePath) -> bool {
    ancestor.is_root() || candidate.as_str().starts_with(&format!("{}/", ancestor.as_str()))
}

/// Connector for `mem://` sessions
///
/// Every session created from one connector shares the same [`MemoryStore`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    required: Option<CredentialKind>,
    capabilities: Capabilities,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            required: None,
            capabilities: Capabilities::default(),
        }
    }

    /// Only accept credentials of `kind`
    pub fn requiring(mut self, kind: CredentialKind) -> Self {
        self.required = Some(kind);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["mem"]
    }

    async fn connect(&self, _uri: &Url, credential: &Credential) -> Result<Arc<dyn Connection>> {
        if let Some(required) = self.required {
            if credential.kind() != required {
                return Err(Error::AuthenticationRequired(self.kind().to_string()));
            }
        }

        Ok(Arc::new(MemoryConnection {
            store: self.store.clone(),
            capabilities: self.capabilities,
        }))
    }
}

/// Live handle onto a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    store: Arc<MemoryStore>,
    capabilities: Capabilities,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn read_dir(&self, path: &ResourcePath) -> Result<Vec<Stat>> {
        let nodes = self.store.nodes.read().await;
        match nodes.get(path) {
            Some(Node::File { .. }) => return Err(Error::NotADirectory(path.to_string())),
            None if !path.is_root() => return Err(Error::NotFound(path.to_string())),
            _ => {}
        }

        Ok(nodes
            .iter()
            .filter(|(candidate, _)| candidate.parent().as_ref() == Some(path))
            .map(|(candidate, node)| node.stat(candidate.name()))
            .collect())
    }

    async fn metadata(&self, path: &ResourcePath) -> Result<Stat> {
        if path.is_root() {
            return Ok(Stat::directory("/", 0));
        }
        self.store
            .nodes
            .read()
            .await
            .get(path)
            .map(|node| node.stat(path.name()))
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn mkdir(&self, path: &ResourcePath) -> Result<()> {
        let mut nodes = self.store.nodes.write().await;
        create_dir_all(&mut nodes, path)
    }

    async fn delete(&self, path: &ResourcePath) -> Result<()> {
        let mut nodes = self.store.nodes.write().await;
        if nodes.remove(path).is_none() {
            return Err(Error::NotFound(path.to_string()));
        }
        nodes.retain(|candidate, _| !is_descendant(candidate, path));
        Ok(())
    }

    async fn reader(&self, path: &ResourcePath) -> Result<Box<dyn RangeReader>> {
        Ok(Box::new(MemoryReader {
            store: self.store.clone(),
            path: path.clone(),
        }))
    }

    async fn writer(&self, path: &ResourcePath) -> Result<Box<dyn Sink>> {
        Ok(Box::new(MemorySink {
            store: self.store.clone(),
            path: path.clone(),
        }))
    }
}

struct MemoryReader {
    store: Arc<MemoryStore>,
    path: ResourcePath,
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        let nodes = self.store.nodes.read().await;
        let Some(Node::File { data, .. }) = nodes.get(&self.path) else {
            return Err(Error::NotFound(self.path.to_string()));
        };

        let end = offset + len;
        if end > data.len() as u64 {
            return Err(Error::InvalidArgument(format!(
                "range {offset}..{end} is beyond the end of {} ({} bytes)",
                self.path,
                data.len()
            )));
        }
        Ok(data.slice(offset as usize..end as usize))
    }
}

struct MemorySink {
    store: Arc<MemoryStore>,
    path: ResourcePath,
}

#[async_trait]
impl Sink for MemorySink {
    async fn open(&mut self) -> Result<String> {
        let upload_id = uuid::Uuid::new_v4().to_string();
        self.store
            .uploads
            .lock()
            .await
            .insert(upload_id.clone(), BytesMut::new());
        Ok(upload_id)
    }

    async fn append(&mut self, cursor: &UploadCursor, slice: &Slice) -> Result<()> {
        let mut uploads = self.store.uploads.lock().await;
        let staged = uploads
            .get_mut(&cursor.upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload session {}", cursor.upload_id)))?;

        if staged.len() as u64 != cursor.offset {
            return Err(Error::InvalidArgument(format!(
                "append at offset {} but upload session holds {} bytes",
                cursor.offset,
                staged.len()
            )));
        }
        staged.extend_from_slice(slice.as_bytes());
        Ok(())
    }

    async fn commit(&mut self, cursor: &UploadCursor) -> Result<()> {
        let mut nodes = self.store.nodes.write().await;
        if let Some(Node::Directory { .. }) = nodes.get(&self.path) {
            return Err(Error::InvalidPath(format!("{} is a directory", self.path)));
        }
        create_parents(&mut nodes, &self.path)?;

        let staged = self
            .store
            .uploads
            .lock()
            .await
            .remove(&cursor.upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload session {}", cursor.upload_id)))?;

        nodes.insert(
            self.path.clone(),
            Node::File {
                data: staged.freeze(),
                time: now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(store: &Arc<MemoryStore>) -> MemoryConnection {
        MemoryConnection {
            store: store.clone(),
            capabilities: Capabilities::default(),
        }
    }

    #[tokio::test]
    async fn test_read_dir_classifies_children() {
        let store = MemoryStore::new();
        store.put_file("/docs/a.txt", "abc").await.unwrap();
        store.create_dir("/docs/sub").await.unwrap();
        store.put_file("/docs/sub/deep.txt", "x").await.unwrap();

        let children = connection(&store)
            .read_dir(&ResourcePath::new("/docs"))
            .await
            .unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "a.txt");
        assert!(children[0].is_file());
        assert_eq!(children[0].size, 3);
        assert_eq!(children[1].name, "sub");
        assert!(children[1].is_dir());
    }

    #[tokio::test]
    async fn test_read_dir_signals() {
        let store = MemoryStore::new();
        store.put_file("/a.txt", "abc").await.unwrap();
        let conn = connection(&store);

        assert!(matches!(
            conn.read_dir(&ResourcePath::new("/a.txt")).await,
            Err(Error::NotADirectory(_))
        ));
        assert!(matches!(
            conn.read_dir(&ResourcePath::new("/missing")).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(conn.read_dir(&ResourcePath::root()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_recursive() {
        let store = MemoryStore::new();
        store.put_file("/d/x", "1").await.unwrap();
        store.put_file("/d/e/y", "2").await.unwrap();
        store.put_file("/dd", "3").await.unwrap();

        connection(&store)
            .delete(&ResourcePath::new("/d"))
            .await
            .unwrap();
        assert!(!store.exists("/d/e/y").await);
        assert!(store.exists("/dd").await);
    }

    #[tokio::test]
    async fn test_mkdir_over_file_fails() {
        let store = MemoryStore::new();
        store.put_file("/f", "1").await.unwrap();
        let result = connection(&store).mkdir(&ResourcePath::new("/f/g")).await;
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_sink_rejects_gaps() {
        let store = MemoryStore::new();
        let mut sink = MemorySink {
            store: store.clone(),
            path: ResourcePath::new("/out"),
        };
        let id = sink.open().await.unwrap();

        let mut cursor = UploadCursor::new(id);
        cursor.offset = 4;
        let result = sink.append(&cursor, &Slice::from(b"late".as_slice())).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(store.pending_uploads().await, 1);
        assert!(!store.exists("/out").await);
    }

    #[tokio::test]
    async fn test_commit_onto_directory_fails() {
        let store = MemoryStore::new();
        store.put_file("/d/x", "1").await.unwrap();
        let mut sink = MemorySink {
            store: store.clone(),
            path: ResourcePath::new("/d"),
        };
        let id = sink.open().await.unwrap();
        let mut cursor = UploadCursor::new(id);
        sink.append(&cursor, &Slice::from(b"hello".as_slice()))
            .await
            .unwrap();
        cursor.offset = 5;

        let result = sink.commit(&cursor).await;
        assert!(matches!(result, Err(Error::InvalidPath(_))));
        assert!(store.read_file("/d").await.is_none());
        assert_eq!(store.read_file("/d/x").await.unwrap(), "1");
        assert_eq!(store.pending_uploads().await, 1);
    }

    #[tokio::test]
    async fn test_connector_credential_check() {
        let connector = MemoryConnector::default().requiring(CredentialKind::OAuthToken);
        let uri = Url::parse("mem://x").unwrap();

        let err = connector
            .connect(&uri, &Credential::key_pair("a", "b"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::AuthenticationRequired(kind) if kind == "memory"));
        assert!(connector.connect(&uri, &Credential::oauth("t")).await.is_ok());
    }
}
