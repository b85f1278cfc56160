//! ds-http: read-only HTTP(S) backend for ds
//!
//! Every URL is a single file: metadata comes from `HEAD` and taps issue
//! ranged `GET`s. Listing, directory creation, deletion and uploads are not
//! supported.

pub mod client;

pub use client::{HttpConnection, HttpConnector};
