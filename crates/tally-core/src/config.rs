use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration loaded from `.tally.toml`.
///
/// Supports layered resolution: CLI flags > config file > defaults.
///
/// # Examples
///
/// ```
/// use tally_core::TallyConfig;
///
/// let config = TallyConfig::default();
/// assert!(config.output.pretty);
/// assert!(config.analysis.authors.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TallyConfig {
    /// Which commits and files are counted.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// How the report is written.
    #[serde(default)]
    pub output: OutputConfig,
}

impl TallyConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Io`](crate::TallyError::Io) if the file cannot be read, or
    /// [`TallyError::Toml`](crate::TallyError::Toml) if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tally_core::TallyConfig;
    /// use std::path::Path;
    ///
    /// let config = TallyConfig::from_file(Path::new(".tally.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Toml`](crate::TallyError::Toml) if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use tally_core::TallyConfig;
    ///
    /// let toml = r#"
    /// [analysis]
    /// authors = ["dev@example.com"]
    /// "#;
    /// let config = TallyConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.analysis.authors, vec!["dev@example.com"]);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Analysis settings.
///
/// # Examples
///
/// ```
/// use tally_core::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert!(config.ignore_file.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Author emails whose commits are counted (exact match).
    #[serde(default)]
    pub authors: Vec<String>,
    /// Ignore file with one glob-like path pattern per line.
    pub ignore_file: Option<PathBuf>,
}

/// Report output settings.
///
/// # Examples
///
/// ```
/// use tally_core::OutputConfig;
///
/// let config = OutputConfig::default();
/// assert_eq!(config.file_name, "git_contributions.json");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Indent the JSON report (default: true).
    #[serde(default = "default_pretty")]
    pub pretty: bool,
    /// File name of the report inside the output directory.
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_pretty() -> bool {
    true
}

fn default_file_name() -> String {
    "git_contributions.json".into()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pretty: default_pretty(),
            file_name: default_file_name(),
        }
    }
}
