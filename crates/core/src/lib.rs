//! ds-core: storage-agnostic transfer engine for the ds CLI
//!
//! This crate provides:
//! - Credentials, sessions and resources over pluggable backends
//! - Streaming taps and drains, and the engine that pumps one into the other
//! - The backend registry and transfer request descriptors
//! - Configuration and endpoint management
//! - In-memory and local filesystem backends
//!
//! Backends plug in through the [`Connector`] and [`Connection`] traits; nothing
//! in this crate depends on a particular storage SDK.

pub mod backends;
pub mod config;
pub mod credential;
pub mod drain;
pub mod endpoint;
pub mod error;
pub mod path;
pub mod registry;
pub mod request;
pub mod resource;
pub mod session;
pub mod slice;
pub mod stat;
pub mod tap;
pub mod transfer;

pub use config::{Config, ConfigManager};
pub use credential::{Credential, CredentialKind};
pub use drain::{Drain, DrainState, Sink, UploadCursor};
pub use endpoint::{Endpoint, EndpointManager};
pub use error::{Error, Result};
pub use path::{EndpointPath, ResourcePath, parse_endpoint_path};
pub use registry::{BackendRegistry, encode_path};
pub use request::{Action, Outcome, ResolvedRequest, ResourceDescriptor, TransferRequest};
pub use resource::Resource;
pub use session::{Capabilities, Connection, Connector, Session, SessionId, SessionState};
pub use slice::Slice;
pub use stat::{EntryKind, Stat};
pub use tap::{RangeReader, Tap};
pub use transfer::{DEFAULT_SLICE_SIZE, TransferEngine, TransferReport, TreeReport};
