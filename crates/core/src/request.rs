//! Transfer request descriptors
//!
//! A [`TransferRequest`] is the serializable form of one operation: what to do,
//! on which resource, with which credential. Requests arrive as JSON files or
//! are built by the CLI from endpoint arguments.
//!
//! ```json
//! {
//!   "action": "transfer",
//!   "src":  { "uri": "s3://bucket/in/a.csv", "credential": { "type": "key_pair", "access_key": "..", "secret_key": ".." } },
//!   "dest": { "uri": "file:///tmp/a.csv" },
//!   "depth": 0
//! }
//! ```

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::path::ResourcePath;
use crate::registry::{BackendRegistry, split_uri};
use crate::resource::Resource;
use crate::stat::Stat;
use crate::transfer::{TransferEngine, TreeReport};

/// Operation carried by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    List,
    Stat,
    Mkdir,
    Delete,
    Transfer,
}

/// Where a resource lives and how to authenticate against it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,

    #[serde(default)]
    pub credential: Credential,
}

impl ResourceDescriptor {
    pub fn new(uri: impl Into<String>, credential: Credential) -> Self {
        Self {
            uri: uri.into(),
            credential,
        }
    }
}

/// One operation against one or two resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub action: Action,

    pub src: ResourceDescriptor,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<ResourceDescriptor>,

    /// Levels of sub-directories a transfer descends into
    #[serde(default)]
    pub depth: u32,
}

/// A request bound to live (still uninitialized) sessions
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub action: Action,
    pub source: Resource,
    pub destination: Option<Resource>,
    pub depth: u32,
}

/// Result of executing a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    Listed { names: Vec<String> },
    Stat { stat: Stat },
    Created { path: ResourcePath },
    Deleted { path: ResourcePath },
    Transferred { report: TreeReport },
}

impl TransferRequest {
    pub fn new(action: Action, src: ResourceDescriptor) -> Self {
        Self {
            action,
            src,
            dest: None,
            depth: 0,
        }
    }

    pub fn with_dest(mut self, dest: ResourceDescriptor) -> Self {
        self.dest = Some(dest);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Bind the request to sessions from `registry`
    ///
    /// Source and destination share one session when they have the same
    /// session base and the same credential.
    pub fn resolve(&self, registry: &BackendRegistry) -> Result<ResolvedRequest> {
        let source = registry.resolve(&self.src.uri, self.src.credential.clone())?;

        let destination = match (&self.dest, self.action) {
            (None, Action::Transfer) => {
                return Err(Error::InvalidArgument(
                    "a transfer request needs a destination".into(),
                ));
            }
            (Some(dest), Action::Transfer) => {
                let (src_base, _) = split_uri(&self.src.uri)?;
                let (dest_base, dest_path) = split_uri(&dest.uri)?;
                if src_base == dest_base && self.src.credential == dest.credential {
                    Some(source.session().select(dest_path.as_str()))
                } else {
                    Some(registry.resolve(&dest.uri, dest.credential.clone())?)
                }
            }
            (Some(_), action) => {
                tracing::warn!(?action, "ignoring destination of a single-resource request");
                None
            }
            (None, _) => None,
        };

        Ok(ResolvedRequest {
            action: self.action,
            source,
            destination,
            depth: self.depth,
        })
    }
}

impl ResolvedRequest {
    /// Run the request to completion
    pub async fn execute(&self, engine: &TransferEngine) -> Result<Outcome> {
        match self.action {
            Action::List => {
                let names = self.source.list().try_collect().await?;
                Ok(Outcome::Listed { names })
            }
            Action::Stat => Ok(Outcome::Stat {
                stat: self.source.stat().await?,
            }),
            Action::Mkdir => Ok(Outcome::Created {
                path: self.source.mkdir().await?.path().clone(),
            }),
            Action::Delete => Ok(Outcome::Deleted {
                path: self.source.delete().await?.path().clone(),
            }),
            Action::Transfer => {
                let destination = self.destination.as_ref().ok_or_else(|| {
                    Error::InvalidArgument("a transfer request needs a destination".into())
                })?;
                let report = engine
                    .transfer_tree(&self.source, destination, self.depth)
                    .await?;
                Ok(Outcome::Transferred { report })
            }
        }
    }
}
