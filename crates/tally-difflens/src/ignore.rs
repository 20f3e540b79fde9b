//! `.gitstatsignore` parsing and path matching.
//!
//! Each non-blank, non-comment line is a path pattern. `*` matches one or
//! more characters within a single path segment. A leading `/` anchors the
//! pattern at the repository root; otherwise it may match below any
//! directory. A pattern matches a file of that name as well as a directory
//! of that name and everything under it.

use std::path::Path;

use tally_core::TallyError;

/// A single compiled ignore pattern.
///
/// # Examples
///
/// ```
/// use tally_difflens::ignore::StatsIgnore;
///
/// let ignore = StatsIgnore::new(Some("/build\n"));
/// let pattern = &ignore.patterns()[0];
/// assert!(pattern.is_anchored());
/// assert!(pattern.matches("/build/out.js"));
/// assert!(!pattern.matches("/src/build/out.js"));
/// ```
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    source: String,
    anchored: bool,
    directory_only: bool,
    segments: Vec<glob::Pattern>,
}

impl IgnorePattern {
    fn compile(line: &str) -> Result<Self, glob::PatternError> {
        let source = line.replace('\\', "/");

        let (anchored, rest) = match source.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, source.as_str()),
        };
        let (directory_only, rest) = match rest.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        let segments = rest
            .split('/')
            .map(segment_pattern)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source,
            anchored,
            directory_only,
            segments,
        })
    }

    /// The trimmed, separator-normalized line this pattern came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the pattern only matches at the repository root.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Test a root-relative path of the form `/dir/file`.
    pub fn matches(&self, normalized_path: &str) -> bool {
        let path = normalized_path.strip_prefix('/').unwrap_or(normalized_path);
        let parts: Vec<&str> = path.split('/').collect();

        let n = self.segments.len();
        if parts.len() < n {
            return false;
        }

        let last_start = if self.anchored { 0 } else { parts.len() - n };
        (0..=last_start).any(|start| {
            // A trailing `/` in the pattern requires something below it.
            if self.directory_only && start + n >= parts.len() {
                return false;
            }
            self.segments
                .iter()
                .zip(&parts[start..start + n])
                .all(|(segment, part)| segment.matches(part))
        })
    }
}

/// Translate one pattern segment into a glob where `*` needs at least one
/// character and every other glob metacharacter is literal.
fn segment_pattern(segment: &str) -> Result<glob::Pattern, glob::PatternError> {
    let glob_text = segment
        .split('*')
        .map(glob::Pattern::escape)
        .collect::<Vec<_>>()
        .join("?*");
    glob::Pattern::new(&glob_text)
}

/// Compiled contents of a `.gitstatsignore` file.
///
/// # Examples
///
/// ```
/// use tally_difflens::ignore::StatsIgnore;
///
/// let ignore = StatsIgnore::new(Some("  /test*\n#comment\ntest.ini\n"));
/// assert_eq!(ignore.patterns().len(), 2);
/// assert!(ignore.matches_filename("tests/file.txt"));
/// assert!(ignore.matches_filename("anything/test.ini"));
/// assert!(!ignore.matches_filename("other.txt"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatsIgnore {
    patterns: Vec<IgnorePattern>,
}

impl StatsIgnore {
    /// Compile ignore-file content. `None` yields an empty set that
    /// matches nothing.
    ///
    /// Lines are trimmed first; blank lines and lines starting with `#`
    /// are skipped. Input order is preserved.
    pub fn new(content: Option<&str>) -> Self {
        let Some(content) = content else {
            return Self::default();
        };

        let mut patterns = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match IgnorePattern::compile(line) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => tracing::warn!(pattern = line, error = %e, "skipping ignore pattern"),
            }
        }

        Self { patterns }
    }

    /// Read and compile an ignore file.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::FileNotFound`] if `path` does not exist and
    /// [`TallyError::Io`] if it cannot be read.
    pub fn from_file(path: &Path) -> tally_core::Result<Self> {
        if !path.exists() {
            return Err(TallyError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::new(Some(&content)))
    }

    /// Compiled patterns in file order.
    pub fn patterns(&self) -> &[IgnorePattern] {
        &self.patterns
    }

    /// Whether no pattern was compiled.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether a repository-relative path matches any pattern.
    ///
    /// Backslashes are treated as separators and a leading `/` is added
    /// when missing.
    pub fn matches_filename(&self, filename: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let mut normalized = filename.replace('\\', "/");
        if !normalized.starts_with('/') {
            normalized.insert(0, '/');
        }

        self.patterns.iter().any(|p| p.matches(&normalized))
    }
}
