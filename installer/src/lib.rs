//! Backdrop installer library.
//!
//! This crate provides the core functionality for updating and installing
//! Backdrop CMS releases: reading the published release feed, downloading and
//! verifying release archives, staging them, and merging them into an existing
//! installation without clobbering site content. It is used by the
//! `backdrop-installer` CLI binary and can be consumed programmatically for
//! testing or custom installation workflows.
//!
//! # Modules
//!
//! - [`artefact`] - Archive transport, digests, extraction, and acquisition
//! - [`catalog`] - Release feed parsing into an ordered catalog
//! - [`cli`] - Command-line argument definitions
//! - [`commands`] - Command orchestration
//! - [`config`] - Configuration file loading
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Top-level error type
//! - [`output`] - Release listings and reconciliation reports
//! - [`progress`] - Download progress tracking and rendering
//! - [`prompt`] - Interactive confirmation
//! - [`reconcile`] - Merging a staged release into an installation
//! - [`scratch`] - Download cache and staging area management
//! - [`stager`] - Archive extraction into a staging folder

pub mod artefact;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dirs;
pub mod error;
pub mod output;
pub mod progress;
pub mod prompt;
pub mod reconcile;
pub mod scratch;
pub mod stager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
