//! HTTP connector, connection and ranged reader

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ds_core::{
    Connection, Connector, Credential, Error, RangeReader, ResourcePath, Result, Stat, encode_path,
};
use reqwest::header::{CONTENT_LENGTH, LAST_MODIFIED, RANGE};
use reqwest::{RequestBuilder, Response, StatusCode};
use url::Url;

const USER_AGENT: &str = concat!("ds/", env!("CARGO_PKG_VERSION"));

/// How requests are authorized
#[derive(Clone)]
enum Auth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

impl Auth {
    fn from_credential(credential: &Credential) -> Option<Self> {
        match credential {
            Credential::Anonymous => Some(Auth::None),
            Credential::OAuthToken { token } => Some(Auth::Bearer(token.clone())),
            Credential::UsernamePassword { username, password } => Some(Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            Credential::KeyPair { .. } => None,
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Auth::None => request,
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

/// Map a non-success status onto an error
fn check_status(status: StatusCode, what: &str) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(Error::NotFound(what.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(Error::AuthenticationRequired("http".to_string()))
        }
        s => Err(Error::Network(format!("{what} returned status {s}"))),
    }
}

fn send_error(e: reqwest::Error, what: &str) -> Error {
    Error::Network(format!("request to {what} failed: {e}"))
}

fn header_str<'a>(response: &'a Response, name: reqwest::header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Seconds since the epoch of an HTTP date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
fn parse_http_date(value: &str) -> Option<i64> {
    jiff::fmt::rfc2822::DateTimeParser::new()
        .parse_timestamp(value)
        .ok()
        .map(|t| t.as_second())
}

/// Connector for `http://` and `https://` URLs
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Use an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn kind(&self) -> &'static str {
        "http"
    }

    fn schemes(&self) -> &'static [&'static str] {
        &["http", "https"]
    }

    async fn connect(&self, uri: &Url, credential: &Credential) -> Result<Arc<dyn Connection>> {
        let auth = Auth::from_credential(credential)
            .ok_or_else(|| Error::AuthenticationRequired(self.kind().to_string()))?;

        Ok(Arc::new(HttpConnection {
            client: self.client.clone(),
            base: uri.clone(),
            auth,
        }))
    }
}

/// Live handle onto one HTTP origin
#[derive(Clone)]
pub struct HttpConnection {
    client: reqwest::Client,
    base: Url,
    auth: Auth,
}

impl std::fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("base", &self.base.as_str())
            .finish()
    }
}

impl HttpConnection {
    /// URL of `path` on this origin; the query string of the base is kept
    pub fn url_for(&self, path: &ResourcePath) -> Url {
        let mut url = self.base.clone();
        url.set_path(&encode_path(path));
        url
    }
}

#[async_trait]
impl Connection for HttpConnection {
    async fn read_dir(&self, path: &ResourcePath) -> Result<Vec<Stat>> {
        Err(Error::NotADirectory(path.to_string()))
    }

    async fn metadata(&self, path: &ResourcePath) -> Result<Stat> {
        if path.is_root() {
            return Ok(Stat::directory("/", 0));
        }

        let url = self.url_for(path);
        let response = self
            .auth
            .apply(self.client.head(url.clone()))
            .send()
            .await
            .map_err(|e| send_error(e, url.as_str()))?;
        check_status(response.status(), url.as_str())?;

        let size = header_str(&response, CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| Error::Network(format!("{url} did not report a Content-Length")))?;
        let time = header_str(&response, LAST_MODIFIED)
            .and_then(parse_http_date)
            .unwrap_or(0);

        Ok(Stat::file(path.name(), size, time))
    }

    async fn reader(&self, path: &ResourcePath) -> Result<Box<dyn RangeReader>> {
        Ok(Box::new(HttpReader {
            client: self.client.clone(),
            url: self.url_for(path),
            auth: self.auth.clone(),
        }))
    }
}

struct HttpReader {
    client: reqwest::Client,
    url: Url,
    auth: Auth,
}

#[async_trait]
impl RangeReader for HttpReader {
    async fn read_range(&self, offset: u64, len: u64) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let request = self
            .client
            .get(self.url.clone())
            .header(RANGE, format!("bytes={}-{}", offset, offset + len - 1));
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| send_error(e, self.url.as_str()))?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(Error::InvalidArgument(format!(
                "range {offset}+{len} is outside {}",
                self.url
            )));
        }
        check_status(status, self.url.as_str())?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {}: {e}", self.url)))?;

        if status == StatusCode::PARTIAL_CONTENT {
            return Ok(body);
        }

        // Server ignored the Range header and sent the whole entity
        tracing::debug!(url = %self.url, "server does not honour ranges");
        let start = (offset as usize).min(body.len());
        let end = (offset + len).min(body.len() as u64) as usize;
        Ok(body.slice(start..end))
    }
}
