//! S3 connector and connection
//!
//! Wraps aws-sdk-s3 and implements the `Connector`/`Connection` traits from
//! ds-core. One session is bound to one bucket.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_smithy_types::DateTime;
use ds_core::{
    Capabilities, Connection, Connector, Credential, Error, RangeReader, ResourcePath, Result,
    Sink, Stat,
};
use url::Url;

use crate::error::classify;
use crate::multipart::{DEFAULT_PART_SIZE, S3Sink};
use crate::reader::S3Reader;

/// Keys per `DeleteObjects` request (S3 limit)
const DELETE_BATCH: usize = 1000;

const DEFAULT_REGION: &str = "us-east-1";

/// Connection settings carried in an `s3://` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
    pub path_style: bool,
    pub part_size: u64,
}

impl S3Options {
    /// Parse `s3://bucket?region=..&endpoint=..&path_style=..&part_size=..`
    ///
    /// Path-style addressing defaults to on when a custom endpoint is given.
    pub fn from_url(url: &Url) -> Result<Self> {
        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::InvalidArgument(format!("{url} names no bucket")))?
            .to_string();

        let mut options = Self {
            bucket,
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            path_style: false,
            part_size: DEFAULT_PART_SIZE,
        };
        let mut path_style = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "region" => options.region = value.into_owned(),
                "endpoint" => options.endpoint = Some(value.into_owned()),
                "path_style" => path_style = Some(parse_bool(&value)?),
                "part_size" => {
                    options.part_size = value.parse().map_err(|_| {
                        Error::InvalidArgument(format!("invalid part_size '{value}'"))
                    })?;
                }
                other => tracing::warn!(option = other, "ignoring unknown S3 option"),
            }
        }

        options.path_style = path_style.unwrap_or(options.endpoint.is_some());
        Ok(options)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(Error::InvalidArgument(format!(
            "expected a boolean, got '{other}'"
        ))),
    }
}

/// Connector for `s3://` URIs
///
/// Accepts `KeyPair` credentials (static access/secret key) or `Anonymous`
/// for public buckets.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

impl S3Connector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for S3Connector {
    fn kind(&self) -> &'static str {
        "s3"
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["s3"]
    }

    async fn connect(&self, uri: &Url, credential: &Credential) -> Result<Arc<dyn Connection>> {
        let loader = match credential {
            Credential::KeyPair {
                access_key,
                secret_key,
            } => {
                let credentials = aws_credential_types::Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "ds-static-credentials",
                );
                aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .credentials_provider(credentials)
            }
            Credential::Anonymous => {
                aws_config::defaults(aws_config::BehaviorVersion::latest()).no_credentials()
            }
            _ => return Err(Error::AuthenticationRequired(self.kind().to_string())),
        };

        let options = S3Options::from_url(uri)?;
        let mut loader = loader.region(aws_config::Region::new(options.region.clone()));
        if let Some(endpoint) = &options.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(options.path_style)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);

        // Surface bad credentials and missing buckets at initialization
        client
            .head_bucket()
            .bucket(&options.bucket)
            .send()
            .await
            .map_err(|e| classify(e, &options.bucket))?;

        tracing::debug!(bucket = %options.bucket, region = %options.region, "connected to S3");
        Ok(Arc::new(S3Connection {
            client,
            bucket: options.bucket,
            part_size: options.part_size,
        }))
    }
}

fn epoch_seconds(time: Option<&DateTime>) -> i64 {
    time.map(DateTime::secs).unwrap_or(0)
}

/// Object key for a resource path
fn object_key(path: &ResourcePath) -> &str {
    path.relative()
}

/// Key prefix holding a directory's children (empty for the root)
fn dir_prefix(path: &ResourcePath) -> String {
    if path.is_root() {
        String::new()
    } else {
        format!("{}/", path.relative())
    }
}

/// Immediate child name of `full` below `prefix`, without a trailing slash
fn child_name<'a>(full: &'a str, prefix: &str) -> Option<&'a str> {
    let name = full.strip_prefix(prefix)?.trim_end_matches('/');
    (!name.is_empty()).then_some(name)
}

/// Live handle onto one bucket
#[derive(Debug, Clone)]
pub struct S3Connection {
    client: aws_sdk_s3::Client,
    bucket: String,
    part_size: u64,
}

impl S3Connection {
    pub fn client(&self) -> &aws_sdk_s3::Client {
        &self.client
    }

    async fn head(&self, path: &ResourcePath) -> Result<Stat> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(object_key(path))
            .send()
            .await
            .map_err(|e| classify(e, path.as_str()))?;

        let size = response.content_length().unwrap_or(0).max(0) as u64;
        let time = epoch_seconds(response.last_modified());
        Ok(Stat::file(path.name(), size, time))
    }

    /// Every key under `prefix`, across pages
    async fn keys_under(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| classify(e, prefix))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(str::to_owned)),
            );

            token = response.next_continuation_token().map(str::to_owned);
            if !response.is_truncated().unwrap_or(false) || token.is_none() {
                return Ok(keys);
            }
        }
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<()> {
        let objects = keys
            .iter()
            .map(|k| {
                ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .map_err(|e| Error::General(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| Error::General(e.to_string()))?;

        let response = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if let Some(failed) = response.errors().first() {
            return Err(Error::General(format!(
                "failed to delete {}: {}",
                failed.key().unwrap_or_default(),
                failed.message().unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for S3Connection {
    fn capabilities(&self) -> Capabilities {
        // Parts go to distinct requests, so reading ahead cannot corrupt them
        Capabilities {
            parallel_append: true,
        }
    }

    async fn read_dir(&self, path: &ResourcePath) -> Result<Vec<Stat>> {
        let prefix = dir_prefix(path);
        let mut children = Vec::new();
        let mut has_marker = false;
        let mut token = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter("/")
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| classify(e, path.as_str()))?;

            for common in response.common_prefixes() {
                if let Some(name) = common.prefix().and_then(|p| child_name(p, &prefix)) {
                    children.push(Stat::directory(name, 0));
                }
            }

            for object in response.contents() {
                let key = object.key().unwrap_or_default();
                if key == prefix {
                    has_marker = true;
                    continue;
                }
                if let Some(name) = child_name(key, &prefix) {
                    let size = object.size().unwrap_or(0).max(0) as u64;
                    let time = epoch_seconds(object.last_modified());
                    children.push(Stat::file(name, size, time));
                }
            }

            token = response.next_continuation_token().map(str::to_owned);
            if !response.is_truncated().unwrap_or(false) || token.is_none() {
                break;
            }
        }

        if children.is_empty() && !has_marker && !path.is_root() {
            // No children and no marker: a plain object or nothing at all
            self.head(path).await?;
            return Err(Error::NotADirectory(path.to_string()));
        }

        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn metadata(&self, path: &ResourcePath) -> Result<Stat> {
        if path.is_root() {
            return Ok(Stat::directory("/", 0));
        }

        match self.head(path).await {
            Err(Error::NotFound(missing)) => {
                let response = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(dir_prefix(path))
                    .max_keys(1)
                    .send()
                    .await
                    .map_err(|e| classify(e, path.as_str()))?;

                if response.contents().is_empty() {
                    Err(Error::NotFound(missing))
                } else {
                    Ok(Stat::directory(path.name(), 0))
                }
            }
            other => other,
        }
    }

    async fn mkdir(&self, path: &ResourcePath) -> Result<()> {
        if path.is_root() {
            return Ok(());
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(dir_prefix(path))
            .body(ByteStream::from_static(b""))
            .send()
            .await
            .map_err(|e| classify(e, path.as_str()))?;
        Ok(())
    }

    async fn delete(&self, path: &ResourcePath) -> Result<()> {
        let mut keys = self.keys_under(&dir_prefix(path)).await?;
        match self.head(path).await {
            Ok(_) => keys.push(object_key(path).to_string()),
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if keys.is_empty() {
            return Err(Error::NotFound(path.to_string()));
        }

        for batch in keys.chunks(DELETE_BATCH) {
            self.delete_batch(batch).await?;
        }
        tracing::debug!(path = %path, objects = keys.len(), "deleted objects");
        Ok(())
    }

    async fn reader(&self, path: &ResourcePath) -> Result<Box<dyn RangeReader>> {
        Ok(Box::new(S3Reader::new(
            self.client.clone(),
            &self.bucket,
            object_key(path),
        )))
    }

    async fn writer(&self, path: &ResourcePath) -> Result<Box<dyn Sink>> {
        if path.is_root() {
            return Err(Error::InvalidPath("cannot write to the bucket root".into()));
        }
        Ok(Box::new(S3Sink::new(
            self.client.clone(),
            &self.bucket,
            object_key(path),
            self.part_size,
        )))
    }
}
