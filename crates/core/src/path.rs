//! Path parsing and normalization
//!
//! Resource paths are absolute, slash separated and normalized lexically, so that
//! selecting a sub-path never needs to talk to a backend. CLI arguments take the
//! form `endpoint/path` and are parsed into an [`EndpointPath`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A normalized absolute path inside one session
///
/// Always starts with `/`, never ends with `/` (except the root itself) and holds
/// no empty, `.` or `..` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct ResourcePath(String);

impl ResourcePath {
    /// The root path `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Normalize a raw path; a missing or empty path becomes `/`
    pub fn new(raw: &str) -> Self {
        Self::root().join(raw)
    }

    /// Resolve `child` against this path
    ///
    /// Relative paths are appended, absolute paths replace the current one.
    /// `..` never climbs above the root.
    pub fn join(&self, child: &str) -> Self {
        let mut parts: Vec<&str> = if child.starts_with('/') {
            Vec::new()
        } else {
            self.components().collect()
        };

        for part in child.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }

        Self(format!("/{}", parts.join("/")))
    }

    /// Get the parent path (one level up), `None` at the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(self.join(".."))
    }

    /// Last path component, `/` for the root
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "/";
        }
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Iterate over the non-empty components
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|p| !p.is_empty())
    }

    /// Path without the leading slash (empty for the root)
    ///
    /// This is the form key-based backends store objects under.
    pub fn relative(&self) -> &str {
        &self.0[1..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ResourcePath {
    fn default() -> Self {
        Self::root()
    }
}

impl std::fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourcePath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ResourcePath {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<ResourcePath> for String {
    fn from(path: ResourcePath) -> Self {
        path.0
    }
}

/// A CLI path argument: endpoint name plus a path inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPath {
    /// Endpoint name
    pub endpoint: String,
    /// Path inside the endpoint
    pub path: ResourcePath,
}

impl std::fmt::Display for EndpointPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_root() {
            write!(f, "{}/", self.endpoint)
        } else {
            write!(f, "{}{}", self.endpoint, self.path)
        }
    }
}

/// Parse `endpoint[/path]` into an [`EndpointPath`]
pub fn parse_endpoint_path(raw: &str) -> Result<EndpointPath> {
    if raw.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    let (endpoint, rest) = match raw.split_once('/') {
        Some((endpoint, rest)) => (endpoint, rest),
        None => (raw, ""),
    };

    if !is_valid_endpoint_name(endpoint) {
        return Err(Error::InvalidPath(format!(
            "'{raw}' does not start with an endpoint name. Use format: endpoint[/path]"
        )));
    }

    Ok(EndpointPath {
        endpoint: endpoint.to_string(),
        path: ResourcePath::new(rest),
    })
}

/// Check if a string is a valid endpoint name
pub fn is_valid_endpoint_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_is_root() {
        assert_eq!(ResourcePath::new("").as_str(), "/");
        assert_eq!(ResourcePath::new("/").as_str(), "/");
        assert!(ResourcePath::default().is_root());
    }

    #[test]
    fn test_normalization() {
        assert_eq!(ResourcePath::new("a//b/").as_str(), "/a/b");
        assert_eq!(ResourcePath::new("/a/./b/../c").as_str(), "/a/c");
        assert_eq!(ResourcePath::new("/../..").as_str(), "/");
    }

    #[test]
    fn test_join_is_associative() {
        let base = ResourcePath::root();
        assert_eq!(base.join("a").join("b"), base.join("a/b"));

        let nested = ResourcePath::new("/x");
        assert_eq!(nested.join("a").join("b"), nested.join("a/b"));
        assert_eq!(nested.join("a/b").as_str(), "/x/a/b");
    }

    #[test]
    fn test_join_absolute_replaces() {
        let path = ResourcePath::new("/x/y");
        assert_eq!(path.join("/z").as_str(), "/z");
    }

    #[test]
    fn test_parent_and_name() {
        let path = ResourcePath::new("/a/b/c.txt");
        assert_eq!(path.name(), "c.txt");

        let parent = path.parent().unwrap();
        assert_eq!(parent.as_str(), "/a/b");

        let root = parent.parent().unwrap().parent().unwrap();
        assert!(root.is_root());
        assert_eq!(root.name(), "/");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_relative() {
        assert_eq!(ResourcePath::new("/a/b").relative(), "a/b");
        assert_eq!(ResourcePath::root().relative(), "");
    }

    #[test]
    fn test_parse_endpoint_path() {
        let parsed = parse_endpoint_path("backup/photos/2024/a.jpg").unwrap();
        assert_eq!(parsed.endpoint, "backup");
        assert_eq!(parsed.path.as_str(), "/photos/2024/a.jpg");
        assert_eq!(parsed.to_string(), "backup/photos/2024/a.jpg");
    }

    #[test]
    fn test_parse_endpoint_only() {
        let parsed = parse_endpoint_path("backup").unwrap();
        assert!(parsed.path.is_root());
        assert_eq!(parsed.to_string(), "backup/");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_endpoint_path("").is_err());
        assert!(parse_endpoint_path("/abs/path").is_err());
        assert!(parse_endpoint_path("bad name/x").is_err());
    }

    #[test]
    fn test_serde_normalizes() {
        let path: ResourcePath = serde_json::from_str("\"a//b/\"").unwrap();
        assert_eq!(path.as_str(), "/a/b");
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"/a/b\"");
    }
}
