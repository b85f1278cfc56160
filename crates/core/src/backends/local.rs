//! Local filesystem backend (`file://`)
//!
//! Resource paths map onto a root directory (`/` unless rooted elsewhere).
//! Uploads are written to a hidden part file next to the target and renamed
//! into place on commit, so an interrupted transfer never clobbers the target.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use url::Url;

use crate::credential::Credential;
use crate::drain::{Sink, UploadCursor};
use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::session::{Capabilities, Connection, Connector};
use crate::slice::Slice;
use crate::stat::Stat;
use crate::tap::RangeReader;

/// Prefix of in-progress upload files; hidden from listings
const PART_PREFIX: &str = ".ds-part-";

fn io_error(e: std::io::Error, path: &Path) -> Error {
    match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        _ => Error::Io(e),
    }
}

fn to_stat(name: &str, meta: &std::fs::Metadata) -> Stat {
    let time = meta
        .modified()
        .ok()
        .and_then(|t| jiff::Timestamp::try_from(t).ok())
        .map(|t| t.as_second())
        .unwrap_or_default();

    if meta.is_dir() {
        Stat::directory(name, time)
    } else {
        Stat::file(name, meta.len(), time)
    }
}

/// Connector for `file://` URIs; only anonymous credentials are accepted
#[derive(Debug, Clone)]
pub struct LocalConnector {
    root: PathBuf,
}

impl Default for LocalConnector {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map resource paths under `root` instead of `/`
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Connector for LocalConnector {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["file"]
    }

    async fn connect(&self, _uri: &Url, credential: &Credential) -> Result<Arc<dyn Connection>> {
        if !matches!(credential, Credential::Anonymous) {
            return Err(Error::AuthenticationRequired(self.kind().to_string()));
        }

        let meta = fs::metadata(&self.root)
            .await
            .map_err(|e| io_error(e, &self.root))?;
        if !meta.is_dir() {
            return Err(Error::Config(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        Ok(Arc::new(LocalConnection {
            root: self.root.clone(),
        }))
    }
}

/// Live handle onto a local directory tree
#[derive(Debug, Clone)]
pub struct LocalConnection {
    root: PathBuf,
}

impl LocalConnection {
    fn fs_path(&self, path: &ResourcePath) -> PathBuf {
        self.root.join(path.relative())
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            parallel_append: true,
        }
    }

    async fn read_dir(&self, path: &ResourcePath) -> Result<Vec<Stat>> {
        let dir = self.fs_path(path);
        let meta = fs::metadata(&dir).await.map_err(|e| io_error(e, &dir))?;
        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.to_string()));
        }

        let mut entries = fs::read_dir(&dir).await.map_err(|e| io_error(e, &dir))?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(PART_PREFIX) {
                continue;
            }
            // Entries can vanish between listing and stat
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            children.push(to_stat(&name, &meta));
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn metadata(&self, path: &ResourcePath) -> Result<Stat> {
        let target = self.fs_path(path);
        let meta = fs::metadata(&target)
            .await
            .map_err(|e| io_error(e, &target))?;
        Ok(to_stat(path.name(), &meta))
    }

    async fn mkdir(&self, path: &ResourcePath) -> Result<()> {
        let target = self.fs_path(path);
        fs::create_dir_all(&target)
            .await
            .map_err(|e| io_error(e, &target))
    }

    async fn delete(&self, path: &ResourcePath) -> Result<()> {
        let target = self.fs_path(path);
        let meta = fs::symlink_metadata(&target)
            .await
            .map_err(|e| io_error(e, &target))?;

        let result = if meta.is_dir() {
            fs::remove_dir_all(&target).await
        } else {
            fs::remove_file(&target).await
        };
        result.map_err(|e| io_error(e, &target))
    }

    async fn reader(&self, path: &ResourcePath) -> Result<Box<dyn RangeReader>> {
        Ok(Box::new(LocalReader {
            path: self.fs_path(path),
        }))
    }

    async fn writer(&self, path: &ResourcePath) -> Result<Box<dyn Sink>> {
        Ok(Box::new(LocalSink {
            target: self.fs_path(path),
            part: None,
        }))
    }
}

struct LocalReader {
    path: PathBuf,
}

#[async_trait]
impl RangeReader for LocalReader {
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        let mut file = fs::File::open(&self.path)
            .await
            .map_err(|e| io_error(e, &self.path))?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = Vec::with_capacity(len as usize);
        file.take(len).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

struct PartFile {
    path: PathBuf,
    file: fs::File,
    written: u64,
}

struct LocalSink {
    target: PathBuf,
    part: Option<PartFile>,
}

impl LocalSink {
    fn part_mut(&mut self, upload_id: &str) -> Result<&mut PartFile> {
        self.part
            .as_mut()
            .ok_or_else(|| Error::NotFound(format!("upload session {upload_id}")))
    }
}

#[async_trait]
impl Sink for LocalSink {
    async fn open(&mut self) -> Result<String> {
        let parent = self
            .target
            .parent()
            .ok_or_else(|| Error::InvalidPath(self.target.display().to_string()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(e, parent))?;

        let upload_id = uuid::Uuid::new_v4().to_string();
        let path = parent.join(format!("{PART_PREFIX}{upload_id}"));
        let file = fs::File::create(&path)
            .await
            .map_err(|e| io_error(e, &path))?;

        tracing::debug!(part = %path.display(), "opened part file");
        self.part = Some(PartFile {
            path,
            file,
            written: 0,
        });
        Ok(upload_id)
    }

    async fn append(&mut self, cursor: &UploadCursor, slice: &Slice) -> Result<()> {
        let part = self.part_mut(&cursor.upload_id)?;
        if part.written != cursor.offset {
            return Err(Error::InvalidArgument(format!(
                "append at offset {} but part file holds {} bytes",
                cursor.offset, part.written
            )));
        }
        part.file.write_all(slice.as_bytes()).await?;
        part.written += slice.len();
        Ok(())
    }

    async fn commit(&mut self, cursor: &UploadCursor) -> Result<()> {
        let mut part = self
            .part
            .take()
            .ok_or_else(|| Error::NotFound(format!("upload session {}", cursor.upload_id)))?;
        part.file.flush().await?;
        part.file.sync_all().await?;
        drop(part.file);

        fs::rename(&part.path, &self.target)
            .await
            .map_err(|e| io_error(e, &self.target))
    }
}
