//! Release archive transfer, verification, and extraction.
//!
//! # Sub-modules
//!
//! - [`digest`] - Declared digests (`PackageDigest`) and file hashing.
//! - [`download`] - Feed and archive download trait and HTTP implementation.
//! - [`extraction`] - Zip extraction with path traversal protection.
//! - [`fetcher`] - Cached, retrying, verified package acquisition.

pub mod digest;
pub mod download;
pub mod extraction;
pub mod fetcher;
