//! Multipart upload drain
//!
//! Slices arrive in whatever size the engine chose, but every S3 part except
//! the last must be at least 5 MiB. Appended slices are therefore buffered and
//! flushed as fixed-size parts; commit uploads the remainder and completes the
//! upload.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::{Bytes, BytesMut};
use ds_core::{Error, Result, Sink, Slice, UploadCursor};

use crate::error::classify;

/// Default part size: 8 MiB
pub const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts: 10,000 (S3 limit)
pub const MAX_PARTS: i32 = 10_000;

/// Regroups appended bytes into numbered parts
#[derive(Debug)]
pub struct PartBuffer {
    pending: BytesMut,
    part_size: usize,
    next_part: i32,
    received: u64,
}

impl PartBuffer {
    /// `part_size` is clamped to the S3 limits
    pub fn new(part_size: u64) -> Self {
        Self {
            pending: BytesMut::new(),
            part_size: part_size.clamp(MIN_PART_SIZE, MAX_PART_SIZE) as usize,
            next_part: 1,
            received: 0,
        }
    }

    pub fn part_size(&self) -> u64 {
        self.part_size as u64
    }

    /// Total bytes pushed so far
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Buffer `data` and return every part that is now full
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<(i32, Bytes)>> {
        self.pending.extend_from_slice(data);
        self.received += data.len() as u64;

        let mut ready = Vec::new();
        while self.pending.len() >= self.part_size {
            let part = self.pending.split_to(self.part_size).freeze();
            ready.push((self.take_number()?, part));
        }
        Ok(ready)
    }

    /// The buffered remainder as the last part, if any bytes are left
    pub fn finish(&mut self) -> Result<Option<(i32, Bytes)>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let part = self.pending.split().freeze();
        Ok(Some((self.take_number()?, part)))
    }

    fn take_number(&mut self) -> Result<i32> {
        if self.next_part > MAX_PARTS {
            return Err(Error::InvalidArgument(format!(
                "object needs more than {MAX_PARTS} parts of {} bytes",
                self.part_size
            )));
        }
        let number = self.next_part;
        self.next_part += 1;
        Ok(number)
    }
}

/// Content type for a key, guessed from its extension
pub(crate) fn content_type(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Drain target backed by an S3 multipart upload
pub struct S3Sink {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
    upload_id: Option<String>,
    buffer: PartBuffer,
    completed: Vec<CompletedPart>,
}

impl S3Sink {
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        key: impl Into<String>,
        part_size: u64,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
            upload_id: None,
            buffer: PartBuffer::new(part_size),
            completed: Vec::new(),
        }
    }

    fn check_cursor(&self, cursor: &UploadCursor) -> Result<&str> {
        let upload_id = self
            .upload_id
            .as_deref()
            .filter(|id| *id == cursor.upload_id)
            .ok_or_else(|| Error::NotFound(format!("upload session {}", cursor.upload_id)))?;

        if cursor.offset != self.buffer.received() {
            return Err(Error::InvalidArgument(format!(
                "append at offset {} but upload holds {} bytes",
                cursor.offset,
                self.buffer.received()
            )));
        }
        Ok(upload_id)
    }

    async fn upload_part(&mut self, upload_id: &str, number: i32, data: Bytes) -> Result<()> {
        let size = data.len();
        let response = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .part_number(number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify(e, &self.key))?;

        tracing::debug!(key = %self.key, part = number, size, "uploaded part");
        self.completed.push(
            CompletedPart::builder()
                .part_number(number)
                .set_e_tag(response.e_tag().map(str::to_owned))
                .build(),
        );
        Ok(())
    }

    async fn put_empty(&self, upload_id: &str) -> Result<()> {
        // S3 rejects completing an upload with no parts
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| classify(e, &self.key))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type(content_type(&self.key))
            .body(ByteStream::from(Bytes::new()))
            .send()
            .await
            .map_err(|e| classify(e, &self.key))?;
        Ok(())
    }
}

#[async_trait]
impl Sink for S3Sink {
    async fn open(&mut self) -> Result<String> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type(content_type(&self.key))
            .send()
            .await
            .map_err(|e| classify(e, &self.key))?;

        let upload_id = response
            .upload_id()
            .ok_or_else(|| Error::General("S3 returned no upload id".into()))?
            .to_string();

        tracing::debug!(key = %self.key, %upload_id, "created multipart upload");
        self.upload_id = Some(upload_id.clone());
        Ok(upload_id)
    }

    async fn append(&mut self, cursor: &UploadCursor, slice: &Slice) -> Result<()> {
        let upload_id = self.check_cursor(cursor)?.to_string();
        for (number, part) in self.buffer.push(slice.as_bytes())? {
            self.upload_part(&upload_id, number, part).await?;
        }
        Ok(())
    }

    async fn commit(&mut self, cursor: &UploadCursor) -> Result<()> {
        let upload_id = self.check_cursor(cursor)?.to_string();

        if let Some((number, part)) = self.buffer.finish()? {
            self.upload_part(&upload_id, number, part).await?;
        }

        if self.completed.is_empty() {
            return self.put_empty(&upload_id).await;
        }

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(std::mem::take(&mut self.completed)))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| classify(e, &self.key))?;

        tracing::debug!(key = %self.key, %upload_id, bytes = cursor.offset, "completed multipart upload");
        Ok(())
    }
}
