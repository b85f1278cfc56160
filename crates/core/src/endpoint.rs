//! Endpoint management
//!
//! Endpoints are named storage locations: a base URI plus the credential used
//! to open sessions against it. CLI arguments address them as `name/path`.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ConfigManager;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::path::{ResourcePath, is_valid_endpoint_name};
use crate::registry::encode_path;

/// A named storage location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Unique name for this endpoint
    pub name: String,

    /// Base URI, e.g. `s3://bucket?region=eu-west-1` or `file:///srv/data`
    pub uri: String,

    #[serde(default)]
    pub credential: Credential,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, uri: impl Into<String>, credential: Credential) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            credential,
        }
    }

    /// Check the name and that the URI parses
    pub fn validate(&self) -> Result<()> {
        if !is_valid_endpoint_name(&self.name) {
            return Err(Error::InvalidArgument(format!(
                "invalid endpoint name '{}'",
                self.name
            )));
        }
        Url::parse(&self.uri)?;
        Ok(())
    }

    /// Full URI of `path` below this endpoint's base path
    pub fn locate(&self, path: &str) -> Result<String> {
        let mut url = Url::parse(&self.uri)?;
        let base = ResourcePath::new(&percent_decode_str(url.path()).decode_utf8_lossy());
        let full = base.join(path.trim_start_matches('/'));
        url.set_path(&encode_path(&full));
        Ok(url.to_string())
    }
}

/// Manager for endpoint operations
pub struct EndpointManager {
    config_manager: ConfigManager,
}

impl EndpointManager {
    pub fn with_config_manager(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }

    /// Create an EndpointManager using the default config location
    pub fn new() -> Result<Self> {
        Ok(Self {
            config_manager: ConfigManager::new()?,
        })
    }

    pub fn list(&self) -> Result<Vec<Endpoint>> {
        Ok(self.config_manager.load()?.endpoints)
    }

    pub fn get(&self, name: &str) -> Result<Endpoint> {
        self.config_manager
            .load()?
            .endpoints
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::EndpointNotFound(name.to_string()))
    }

    /// Add or replace an endpoint
    pub fn set(&self, endpoint: Endpoint) -> Result<()> {
        endpoint.validate()?;
        let mut config = self.config_manager.load()?;

        config.endpoints.retain(|e| e.name != endpoint.name);
        config.endpoints.push(endpoint);

        self.config_manager.save(&config)
    }

    /// Add an endpoint, failing if the name is taken
    pub fn add(&self, endpoint: Endpoint) -> Result<()> {
        if self.exists(&endpoint.name)? {
            return Err(Error::EndpointExists(endpoint.name));
        }
        self.set(endpoint)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let mut config = self.config_manager.load()?;
        let original_len = config.endpoints.len();

        config.endpoints.retain(|e| e.name != name);

        if config.endpoints.len() == original_len {
            return Err(Error::EndpointNotFound(name.to_string()));
        }

        self.config_manager.save(&config)
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .config_manager
            .load()?
            .endpoints
            .iter()
            .any(|e| e.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::split_uri;
    use tempfile::TempDir;

    fn temp_endpoint_manager() -> (EndpointManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_manager = ConfigManager::with_path(temp_dir.path().join("config.toml"));
        (EndpointManager::with_config_manager(config_manager), temp_dir)
    }

    #[test]
    fn test_locate() {
        let endpoint = Endpoint::new("a", "s3://bucket?region=eu-west-1", Credential::Anonymous);
        assert_eq!(
            endpoint.locate("dir/f.txt").unwrap(),
            "s3://bucket/dir/f.txt?region=eu-west-1"
        );

        let endpoint = Endpoint::new("b", "file:///srv/data", Credential::Anonymous);
        assert_eq!(endpoint.locate("").unwrap(), "file:///srv/data");
        assert_eq!(endpoint.locate("x/../y").unwrap(), "file:///srv/data/y");
    }

    #[test]
    fn test_locate_keeps_literal_percent() {
        let endpoint = Endpoint::new("e", "file:///srv", Credential::Anonymous);
        let uri = endpoint.locate("/a%20b.txt").unwrap();
        assert_eq!(uri, "file:///srv/a%2520b.txt");

        let (_, path) = split_uri(&uri).unwrap();
        assert_eq!(path.as_str(), "/srv/a%20b.txt");

        let uri = endpoint.locate("my file.txt").unwrap();
        assert_eq!(split_uri(&uri).unwrap().1.as_str(), "/srv/my file.txt");
    }

    #[test]
    fn test_set_and_get() {
        let (manager, _temp_dir) = temp_endpoint_manager();
        manager
            .set(Endpoint::new("scratch", "mem://scratch", Credential::Anonymous))
            .unwrap();

        let endpoint = manager.get("scratch").unwrap();
        assert_eq!(endpoint.uri, "mem://scratch");
    }

    #[test]
    fn test_set_replaces_existing() {
        let (manager, _temp_dir) = temp_endpoint_manager();
        manager
            .set(Endpoint::new("e", "mem://old", Credential::Anonymous))
            .unwrap();
        manager
            .set(Endpoint::new("e", "mem://new", Credential::oauth("t")))
            .unwrap();

        let endpoints = manager.list().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].uri, "mem://new");
    }

    #[test]
    fn test_add_conflict() {
        let (manager, _temp_dir) = temp_endpoint_manager();
        manager
            .add(Endpoint::new("e", "mem://x", Credential::Anonymous))
            .unwrap();
        let result = manager.add(Endpoint::new("e", "mem://y", Credential::Anonymous));
        assert!(matches!(result, Err(Error::EndpointExists(_))));
    }

    #[test]
    fn test_remove() {
        let (manager, _temp_dir) = temp_endpoint_manager();
        manager
            .set(Endpoint::new("e", "mem://x", Credential::Anonymous))
            .unwrap();
        assert!(manager.exists("e").unwrap());

        manager.remove("e").unwrap();
        assert!(!manager.exists("e").unwrap());
        assert!(matches!(
            manager.remove("e"),
            Err(Error::EndpointNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let (manager, _temp_dir) = temp_endpoint_manager();
        let result = manager.set(Endpoint::new("bad/name", "mem://x", Credential::Anonymous));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let result = manager.set(Endpoint::new("ok", "not a uri", Credential::Anonymous));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
