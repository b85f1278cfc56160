//! Push-based streaming sink
//!
//! A [`Drain`] owns a backend [`Sink`] and an explicit lifecycle:
//!
//! ```text
//! NotStarted --start()--> Started(cursor) --finish()--> Finished(cursor)
//!                            |    ^
//!                            +----+ drain(slice): cursor.offset += slice.len()
//! ```
//!
//! Calls made in the wrong state are rejected before the sink is touched.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::slice::Slice;

/// Position of an open upload session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCursor {
    /// Backend upload session identifier
    pub upload_id: String,
    /// Bytes accepted so far; the next append lands here
    pub offset: u64,
}

impl UploadCursor {
    pub fn new(upload_id: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
            offset: 0,
        }
    }

    fn advanced(&self, len: u64) -> Self {
        Self {
            upload_id: self.upload_id.clone(),
            offset: self.offset + len,
        }
    }
}

/// Backend seam for cursor-based uploads
#[async_trait]
pub trait Sink: Send {
    /// Allocate an upload session and return its identifier
    async fn open(&mut self) -> Result<String>;

    /// Append `slice` at `cursor.offset`
    async fn append(&mut self, cursor: &UploadCursor, slice: &Slice) -> Result<()>;

    /// Commit everything appended up to `cursor.offset`
    async fn commit(&mut self, cursor: &UploadCursor) -> Result<()>;
}

/// Lifecycle state of a [`Drain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainState {
    NotStarted,
    Started(UploadCursor),
    Finished(UploadCursor),
}

impl DrainState {
    fn label(&self) -> &'static str {
        match self {
            DrainState::NotStarted => "not started",
            DrainState::Started(_) => "started",
            DrainState::Finished(_) => "finished",
        }
    }
}

/// Ordered push-sink of slices bound to one resource
pub struct Drain {
    sink: Box<dyn Sink>,
    state: DrainState,
}

impl std::fmt::Debug for Drain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drain").field("state", &self.state).finish()
    }
}

impl Drain {
    pub fn new(sink: Box<dyn Sink>) -> Self {
        Self {
            sink,
            state: DrainState::NotStarted,
        }
    }

    pub fn state(&self) -> &DrainState {
        &self.state
    }

    /// Bytes accepted by the backend so far
    pub fn uploaded(&self) -> u64 {
        match &self.state {
            DrainState::NotStarted => 0,
            DrainState::Started(cursor) | DrainState::Finished(cursor) => cursor.offset,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, DrainState::Finished(_))
    }

    /// Open the backend upload session
    pub async fn start(&mut self) -> Result<()> {
        if self.state != DrainState::NotStarted {
            return Err(self.out_of_order("start"));
        }

        let upload_id = self.sink.open().await?;
        tracing::debug!(upload_id = %upload_id, "drain started");
        self.state = DrainState::Started(UploadCursor::new(upload_id));
        Ok(())
    }

    /// Append one slice at the current cursor
    ///
    /// The cursor only advances when the backend accepted the slice.
    pub async fn drain(&mut self, slice: &Slice) -> Result<()> {
        let DrainState::Started(cursor) = &self.state else {
            return Err(self.out_of_order("drain"));
        };

        self.sink.append(cursor, slice).await?;
        self.state = DrainState::Started(cursor.advanced(slice.len()));
        Ok(())
    }

    /// Commit the upload and return the committed size
    ///
    /// Finishing an already finished drain is a no-op.
    pub async fn finish(&mut self) -> Result<u64> {
        match &self.state {
            DrainState::NotStarted => Err(self.out_of_order("finish")),
            DrainState::Finished(cursor) => Ok(cursor.offset),
            DrainState::Started(cursor) => {
                self.sink.commit(cursor).await?;
                let size = cursor.offset;
                tracing::debug!(upload_id = %cursor.upload_id, size, "drain finished");
                self.state = DrainState::Finished(cursor.clone());
                Ok(size)
            }
        }
    }

    fn out_of_order(&self, op: &'static str) -> Error {
        Error::DrainState {
            op,
            state: self.state.label(),
        }
    }
}
