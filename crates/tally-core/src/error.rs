use std::path::PathBuf;

/// Errors that can occur while mining contribution statistics.
///
/// Library crates return this type directly; the `tally` binary converts
/// it into a `miette` report at the boundary.
///
/// # Examples
///
/// ```
/// use tally_core::TallyError;
///
/// let err = TallyError::Config("no authors specified".into());
/// assert!(err.to_string().contains("no authors"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TallyError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(tally::config))]
    Config(String),

    /// Repository access failure (open, log, diff, tree or blob read).
    #[error("git error: {0}")]
    #[diagnostic(code(tally::git))]
    Git(String),

    /// Malformed diff or timestamp input.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(tally::toml), help("check the syntax of your .tally.toml"))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(tally::file_not_found))]
    FileNotFound(PathBuf),
}
