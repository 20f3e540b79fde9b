use std::collections::HashMap;
use std::fmt;
use std::ops::AddAssign;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::Result;

/// File mode git records for symbolic links.
pub const SYMLINK_MODE: &str = "120000";

/// A commit as read from the repository log.
///
/// Both timestamps keep the offset recorded in the commit object, so hour
/// and weekday buckets reflect the author's own wall clock.
///
/// # Examples
///
/// ```
/// use chrono::DateTime;
/// use tally_core::Commit;
///
/// let at = DateTime::parse_from_rfc3339("2021-03-04T09:15:00+01:00").unwrap();
/// let commit = Commit {
///     hash: "4f2a9c1".into(),
///     author_email: "dev@example.com".into(),
///     authored_at: at,
///     committed_at: at,
/// };
/// assert_eq!(commit.author_email, "dev@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Full commit hash.
    pub hash: String,
    /// Author email, compared verbatim against the configured author set.
    pub author_email: String,
    /// Author timestamp.
    pub authored_at: DateTime<FixedOffset>,
    /// Committer timestamp.
    pub committed_at: DateTime<FixedOffset>,
}

/// Kind of object referenced by a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// File content (regular file or symlink).
    Blob,
    /// Directory.
    Tree,
    /// Submodule reference.
    Commit,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Object kind.
    pub kind: ObjectKind,
    /// Octal file mode, e.g. `"100644"` or `"120000"`.
    pub mode: String,
}

/// Recursive tree listing of a commit, keyed by repository-relative path.
///
/// # Examples
///
/// ```
/// use tally_core::{ObjectKind, TreeEntry, TreeListing};
///
/// let mut tree = TreeListing::default();
/// tree.insert("vendor/lib", TreeEntry { kind: ObjectKind::Commit, mode: "160000".into() });
/// tree.insert("link", TreeEntry { kind: ObjectKind::Blob, mode: "120000".into() });
/// assert!(tree.is_submodule("vendor/lib"));
/// assert!(tree.is_symlink("link"));
/// assert!(!tree.is_symlink("vendor/lib"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeListing {
    entries: HashMap<String, TreeEntry>,
}

impl TreeListing {
    /// Record an entry for `path`.
    pub fn insert(&mut self, path: impl Into<String>, entry: TreeEntry) {
        self.entries.insert(path.into(), entry);
    }

    /// Look up the entry for `path`.
    pub fn get(&self, path: &str) -> Option<&TreeEntry> {
        self.entries.get(path)
    }

    /// Whether `path` is a submodule reference at this revision.
    pub fn is_submodule(&self, path: &str) -> bool {
        self.get(path)
            .is_some_and(|entry| entry.kind == ObjectKind::Commit)
    }

    /// Whether `path` is a blob stored with the symlink mode.
    pub fn is_symlink(&self, path: &str) -> bool {
        self.get(path)
            .is_some_and(|entry| entry.kind == ObjectKind::Blob && entry.mode == SYMLINK_MODE)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the listing is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Added/deleted line tally.
///
/// # Examples
///
/// ```
/// use tally_core::LineCounts;
///
/// let mut total = LineCounts::default();
/// total += LineCounts { added: 3, deleted: 1 };
/// total += LineCounts { added: 2, deleted: 0 };
/// assert_eq!(total, LineCounts { added: 5, deleted: 1 });
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCounts {
    /// Lines added.
    pub added: u64,
    /// Lines deleted.
    pub deleted: u64,
}

impl AddAssign for LineCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.deleted += rhs.deleted;
    }
}

/// Outcome of classifying a file path.
///
/// `Excluded` means a rule positively rejected the file (vendored library,
/// license, generated artefact). `Unknown` means nothing could be inferred,
/// e.g. the content was empty or unreadable. Both are skipped today.
///
/// # Examples
///
/// ```
/// use tally_core::Language;
///
/// let lang = Language::Labeled("Python".into());
/// assert_eq!(lang.label(), Some("Python"));
/// assert_eq!(Language::Excluded.label(), None);
/// assert_eq!(Language::Unknown.to_string(), "<unknown>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Language {
    /// A language label, e.g. `"Golang"`.
    Labeled(String),
    /// The file must not count towards any statistics.
    Excluded,
    /// Nothing could be inferred about the file.
    Unknown,
}

impl Language {
    /// Shorthand for a labeled language.
    pub fn labeled(label: impl Into<String>) -> Self {
        Language::Labeled(label.into())
    }

    /// The label, if the file was classified.
    pub fn label(&self) -> Option<&str> {
        match self {
            Language::Labeled(label) => Some(label),
            Language::Excluded | Language::Unknown => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Labeled(label) => write!(f, "{label}"),
            Language::Excluded => write!(f, "<excluded>"),
            Language::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// Read access to file content at a historical revision.
///
/// The language classifier only sniffs content when path rules are
/// inconclusive, so implementations may be slow or fallible.
pub trait ContentSource {
    /// Return the content of `path` as of `revision`, decoded lossily.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Git`](crate::TallyError::Git) if the blob cannot be read, for example
    /// because the file was deleted in that revision.
    fn read_blob(&self, revision: &str, path: &str) -> Result<String>;
}
