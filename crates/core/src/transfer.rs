//! Transfer engine
//!
//! Pumps slices from a source [`Tap`] into a destination [`Drain`]. Each slice is
//! appended before the next one is requested, unless the destination backend
//! advertises [`Capabilities::parallel_append`], in which case the next read
//! overlaps the current append. Delivery order is the same either way.
//!
//! On the first error the pump stops and the drain is left unfinished: the
//! destination keeps whatever partial, uncommitted state the backend holds.
//!
//! [`Capabilities::parallel_append`]: crate::session::Capabilities::parallel_append

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::drain::Drain;
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::stat::Stat;
use crate::tap::Tap;

/// Default slice size: 4 MiB
pub const DEFAULT_SLICE_SIZE: u64 = 4 * 1024 * 1024;

/// Progress callback, invoked with the length of every committed slice
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Outcome of one file transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub bytes: u64,
    pub slices: u64,
}

/// Outcome of a directory transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeReport {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Orchestrates tap-to-drain transfers
#[derive(Clone)]
pub struct TransferEngine {
    slice_size: u64,
    cancel: CancellationToken,
    progress: Option<ProgressFn>,
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("slice_size", &self.slice_size)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SLICE_SIZE)
    }
}

impl TransferEngine {
    pub fn new(slice_size: u64) -> Self {
        Self {
            slice_size,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Stop transfers when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report progress after every committed slice
    pub fn on_progress(mut self, progress: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn slice_size(&self) -> u64 {
        self.slice_size
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Copy one file from `source` to `destination`
    ///
    /// Session, stat and capability failures while setting up are returned as
    /// they are. Failures while streaming become [`Error::TransferFailed`].
    pub async fn transfer(
        &self,
        source: &Resource,
        destination: &Resource,
    ) -> Result<TransferReport> {
        tokio::try_join!(source.initialize(), destination.initialize())?;

        let read_ahead = destination.capabilities().await?.parallel_append;
        let mut tap = source.tap(self.slice_size).await?;
        let mut drain = destination.sink().await?;

        tracing::info!(
            source = %source,
            destination = %destination,
            size = tap.total_size(),
            slice_size = self.slice_size,
            "starting transfer"
        );

        self.pump(&mut tap, &mut drain, read_ahead).await
    }

    /// Start `drain`, feed it every slice of `tap` in order, then finish it
    ///
    /// `finish` is only called when the tap was exhausted without error.
    pub async fn pump(
        &self,
        tap: &mut Tap,
        drain: &mut Drain,
        read_ahead: bool,
    ) -> Result<TransferReport> {
        let result = self.run_pump(tap, drain, read_ahead).await;
        match &result {
            Ok(report) => {
                tracing::info!(bytes = report.bytes, slices = report.slices, "transfer complete");
            }
            Err(e) => {
                tracing::warn!(
                    bytes = drain.uploaded(),
                    error = %e,
                    "transfer aborted, destination left unfinished"
                );
            }
        }
        result
    }

    async fn run_pump(
        &self,
        tap: &mut Tap,
        drain: &mut Drain,
        read_ahead: bool,
    ) -> Result<TransferReport> {
        let mut slices = 0;

        self.cancellable(0, drain.start())
            .await?
            .map_err(|e| Error::transfer_failed(0, e))?;

        let mut pending = self
            .cancellable(0, tap.next_slice())
            .await?
            .map_err(|e| Error::transfer_failed(0, e))?;

        while let Some(slice) = pending {
            let offset = drain.uploaded();

            let next = if read_ahead && tap.has_more() {
                let (drained, next) = self
                    .cancellable(offset, async {
                        tokio::join!(drain.drain(&slice), tap.next_slice())
                    })
                    .await?;
                drained.map_err(|e| Error::transfer_failed(offset, e))?;
                next
            } else {
                self.cancellable(offset, drain.drain(&slice))
                    .await?
                    .map_err(|e| Error::transfer_failed(offset, e))?;
                self.cancellable(drain.uploaded(), tap.next_slice()).await?
            };

            slices += 1;
            if let Some(progress) = &self.progress {
                progress(slice.len());
            }

            pending = next.map_err(|e| Error::transfer_failed(drain.uploaded(), e))?;
        }

        let bytes = self
            .cancellable(drain.uploaded(), drain.finish())
            .await?
            .map_err(|e| Error::transfer_failed(drain.uploaded(), e))?;

        Ok(TransferReport { bytes, slices })
    }

    /// Copy a file, or a directory tree down to `depth` levels of sub-directories
    ///
    /// With `depth == 0` only the files directly inside `source` are copied.
    /// When a file fails part way, the byte count in the returned
    /// [`Error::TransferFailed`] or [`Error::Cancelled`] covers the whole tree.
    pub async fn transfer_tree(
        &self,
        source: &Resource,
        destination: &Resource,
        depth: u32,
    ) -> Result<TreeReport> {
        let root = source.stat().await?;
        let mut report = TreeReport::default();

        if root.is_file() {
            let copied = self.transfer(source, destination).await?;
            report.files = 1;
            report.bytes = copied.bytes;
            return Ok(report);
        }

        let mut pending: Vec<(Resource, Resource, Stat, u32)> =
            vec![(source.clone(), destination.clone(), root, depth)];

        while let Some((src, dst, stat, remaining)) = pending.pop() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled {
                    bytes_transferred: report.bytes,
                });
            }

            dst.mkdir().await?;
            report.directories += 1;

            for child in stat.children.unwrap_or_default() {
                if !is_plain_name(&child.name) {
                    tracing::warn!(name = %child.name, "skipping entry with unusable name");
                    continue;
                }

                let child_src = src.select(&child.name);
                let child_dst = dst.select(&child.name);

                if child.is_file() {
                    let copied = self
                        .transfer(&child_src, &child_dst)
                        .await
                        .map_err(|e| counted_from(e, report.bytes))?;
                    report.files += 1;
                    report.bytes += copied.bytes;
                } else if remaining > 0 {
                    let child_stat = child_src.stat().await?;
                    pending.push((child_src, child_dst, child_stat, remaining - 1));
                }
            }
        }

        Ok(report)
    }

    async fn cancellable<T>(&self, bytes: u64, fut: impl Future<Output = T>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled { bytes_transferred: bytes }),
            value = fut => Ok(value),
        }
    }
}

/// Shift the byte count of a streaming error by `done`
fn counted_from(error: Error, done: u64) -> Error {
    match error {
        Error::TransferFailed {
            bytes_transferred,
            source,
        } => Error::TransferFailed {
            bytes_transferred: done + bytes_transferred,
            source,
        },
        Error::Cancelled { bytes_transferred } => Error::Cancelled {
            bytes_transferred: done + bytes_transferred,
        },
        other => other,
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}
