//! Ranged GET reads for taps

use async_trait::async_trait;
use bytes::Bytes;
use ds_core::{Error, RangeReader, Result};

use crate::error::classify;

/// Reads byte ranges of one object
pub struct S3Reader {
    client: aws_sdk_s3::Client,
    bucket: String,
    key: String,
}

impl S3Reader {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// HTTP `Range` header value covering `len` bytes from `offset`
pub(crate) fn range_header(offset: u64, len: u64) -> String {
    format!("bytes={}-{}", offset, offset + len - 1)
}

#[async_trait]
impl RangeReader for S3Reader {
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .range(range_header(offset, len))
            .send()
            .await
            .map_err(|e| classify(e, &self.key))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Error::Network(e.to_string()))?
            .into_bytes();

        tracing::trace!(key = %self.key, offset, len = data.len(), "read range");
        Ok(data)
    }
}
