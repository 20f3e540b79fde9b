//! Core types, configuration, and error handling for git-tally.
//!
//! This crate provides the shared foundation used by the other tally crates:
//! - [`TallyError`]: unified error type using `thiserror`
//! - [`TallyConfig`]: configuration loaded from `.tally.toml`
//! - Shared types: [`Commit`], [`TreeListing`], [`LineCounts`], [`Language`]
//! - [`ContentSource`]: lazy access to file content at a revision

mod config;
mod error;
mod types;

pub use config::{AnalysisConfig, OutputConfig, TallyConfig};
pub use error::TallyError;
pub use types::{
    Commit, ContentSource, Language, LineCounts, ObjectKind, TreeEntry, TreeListing, SYMLINK_MODE,
};

/// A convenience `Result` type for tally operations.
pub type Result<T> = std::result::Result<T, TallyError>;
