//! Backend registry
//!
//! Maps URI schemes to [`Connector`]s. A URI such as `s3://bucket/a/b.txt` is
//! split into the session base (`s3://bucket`) and the resource path (`/a/b.txt`).

use std::collections::HashMap;
use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::Url;

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::resource::Resource;
use crate::session::{Connector, Session};

/// Registry of backends keyed by URI scheme
#[derive(Clone, Default)]
pub struct BackendRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut schemes: Vec<&String> = self.connectors.keys().collect();
        schemes.sort();
        f.debug_struct("BackendRegistry")
            .field("schemes", &schemes)
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under every scheme it serves
    pub fn register(&mut self, connector: Arc<dyn Connector>) -> &mut Self {
        for scheme in connector.schemes() {
            self.connectors
                .insert(scheme.to_ascii_lowercase(), connector.clone());
        }
        self
    }

    pub fn with(mut self, connector: Arc<dyn Connector>) -> Self {
        self.register(connector);
        self
    }

    pub fn connector(&self, scheme: &str) -> Result<Arc<dyn Connector>> {
        self.connectors
            .get(&scheme.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::UnknownBackend(scheme.to_string()))
    }

    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Create a session for the base of `uri`
    pub fn session(&self, uri: &str, credential: Credential) -> Result<Session> {
        let (base, _) = split_uri(uri)?;
        let connector = self.connector(base.scheme())?;
        Ok(Session::new(connector, base, credential))
    }

    /// Resolve `uri` into a new session and a resource inside it
    pub fn resolve(&self, uri: &str, credential: Credential) -> Result<Resource> {
        let (base, path) = split_uri(uri)?;
        let connector = self.connector(base.scheme())?;
        Ok(Session::new(connector, base, credential).select(path.as_str()))
    }
}

/// Characters escaped in URI path segments; `%` included so names survive decoding
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode a resource path for use as a URI path
///
/// The inverse of the decoding done by [`split_uri`].
pub fn encode_path(path: &ResourcePath) -> String {
    path.as_str()
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a URI into its session base and the path inside it
///
/// The base keeps scheme, authority and query; fragment and path are dropped.
pub fn split_uri(uri: &str) -> Result<(Url, ResourcePath)> {
    let mut base = Url::parse(uri)?;
    let path = ResourcePath::new(&percent_decode_str(base.path()).decode_utf8_lossy());
    base.set_path("");
    base.set_fragment(None);
    Ok((base, path))
}
