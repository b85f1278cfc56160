//! ds-s3: S3 backend for ds
//!
//! Implements the ds-core `Connector`/`Connection` contract on top of
//! aws-sdk-s3. It is the only crate that directly depends on the AWS SDK.
//!
//! Sessions are opened from URIs of the form
//! `s3://bucket?region=eu-west-1&endpoint=http://localhost:9000&path_style=true`.
//! Directories are key prefixes: `mkdir` writes a `key/` marker object.

pub mod client;
pub mod error;
pub mod multipart;
pub mod reader;

pub use client::{S3Connection, S3Connector, S3Options};
