//! Repository access via git2.
//!
//! [`RepositoryAccessor`] is the narrow interface the aggregator reads
//! history through: the commit log, one patch per commit, the tree listing
//! at a commit, and blob content for language sniffing. [`GitRepository`]
//! implements it on top of libgit2.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use git2::{
    DiffFindOptions, DiffFormat, DiffOptions, ErrorCode, ObjectType, Oid, Repository, Sort,
    TreeWalkMode, TreeWalkResult,
};
use tally_core::{
    Commit, ContentSource, ObjectKind, Result, TallyError, TreeEntry, TreeListing,
};

/// Read access to one repository's history.
///
/// All methods address commits by full hash as returned from
/// [`log_commits`](RepositoryAccessor::log_commits).
pub trait RepositoryAccessor: ContentSource {
    /// Every commit reachable from `HEAD`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Git`] if the history cannot be walked.
    fn log_commits(&self) -> Result<Vec<Commit>>;

    /// Unified diff of `commit_id` against its first parent.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Git`] if the commit or its trees cannot be read.
    fn show_diff(&self, commit_id: &str) -> Result<String>;

    /// Recursive listing of the tree at `commit_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Git`] if the commit or its tree cannot be read.
    fn list_tree(&self, commit_id: &str) -> Result<TreeListing>;
}

/// A repository opened with libgit2.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use tally_gitpulse::mining::{GitRepository, RepositoryAccessor};
///
/// let repo = GitRepository::open(Path::new(".")).unwrap();
/// for commit in repo.log_commits().unwrap() {
///     println!("{} {}", &commit.hash[..8], commit.author_email);
/// }
/// ```
pub struct GitRepository {
    repo: Repository,
}

impl GitRepository {
    /// Open the repository at `path`.
    ///
    /// A directory with a `.git` entry is opened as a working copy; anything
    /// else is opened as a bare repository.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Git`] if `path` is not a repository.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = if path.join(".git").exists() {
            Repository::open(path)
        } else {
            Repository::open_bare(path)
        }
        .map_err(|e| {
            TallyError::Git(format!(
                "failed to open repository {}: {e}",
                path.display()
            ))
        })?;

        Ok(Self { repo })
    }

    fn find_commit(&self, commit_id: &str) -> Result<git2::Commit<'_>> {
        let oid = Oid::from_str(commit_id)
            .map_err(|e| TallyError::Git(format!("invalid commit id '{commit_id}': {e}")))?;
        self.repo
            .find_commit(oid)
            .map_err(|e| TallyError::Git(format!("failed to find commit {commit_id}: {e}")))
    }
}

impl ContentSource for GitRepository {
    fn read_blob(&self, revision: &str, path: &str) -> Result<String> {
        let commit = self.find_commit(revision)?;
        let tree = commit
            .tree()
            .map_err(|e| TallyError::Git(format!("failed to get commit tree: {e}")))?;
        let entry = tree
            .get_path(Path::new(path))
            .map_err(|e| TallyError::Git(format!("{path} not found at {revision}: {e}")))?;
        let object = entry
            .to_object(&self.repo)
            .map_err(|e| TallyError::Git(format!("failed to load {path}: {e}")))?;
        let blob = object
            .peel_to_blob()
            .map_err(|e| TallyError::Git(format!("{path} is not a blob: {e}")))?;

        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }
}

impl RepositoryAccessor for GitRepository {
    fn log_commits(&self) -> Result<Vec<Commit>> {
        // A freshly initialised repository has no history yet.
        if let Err(e) = self.repo.head() {
            if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound {
                return Ok(Vec::new());
            }
            return Err(TallyError::Git(format!("failed to resolve HEAD: {e}")));
        }

        let mut revwalk = self
            .repo
            .revwalk()
            .map_err(|e| TallyError::Git(format!("failed to create revwalk: {e}")))?;
        revwalk
            .set_sorting(Sort::TIME)
            .map_err(|e| TallyError::Git(format!("failed to sort revwalk: {e}")))?;
        revwalk
            .push_head()
            .map_err(|e| TallyError::Git(format!("failed to push HEAD: {e}")))?;

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result.map_err(|e| TallyError::Git(format!("revwalk error: {e}")))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| TallyError::Git(format!("failed to find commit: {e}")))?;

            let author = commit.author();
            commits.push(Commit {
                hash: oid.to_string(),
                author_email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
                authored_at: to_datetime(author.when())?,
                committed_at: to_datetime(commit.committer().when())?,
            });
        }

        Ok(commits)
    }

    fn show_diff(&self, commit_id: &str) -> Result<String> {
        let commit = self.find_commit(commit_id)?;

        // `git show` prints a combined diff for merges, which is empty
        // unless a conflict was resolved by hand.
        if commit.parent_count() > 1 {
            return Ok(String::new());
        }

        let commit_tree = commit
            .tree()
            .map_err(|e| TallyError::Git(format!("failed to get commit tree: {e}")))?;
        let parent_tree = if commit.parent_count() == 1 {
            let parent = commit
                .parent(0)
                .map_err(|e| TallyError::Git(format!("failed to get parent: {e}")))?;
            Some(
                parent
                    .tree()
                    .map_err(|e| TallyError::Git(format!("failed to get parent tree: {e}")))?,
            )
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        let mut diff = self
            .repo
            .diff_tree_to_tree(
                parent_tree.as_ref(),
                Some(&commit_tree),
                Some(&mut diff_opts),
            )
            .map_err(|e| TallyError::Git(format!("failed to compute diff: {e}")))?;

        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts))
            .map_err(|e| TallyError::Git(format!("failed to find renames: {e}")))?;

        let mut patch = Vec::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin() as u8);
            }
            patch.extend_from_slice(line.content());
            true
        })
        .map_err(|e| TallyError::Git(format!("failed to render diff: {e}")))?;

        Ok(String::from_utf8_lossy(&patch).into_owned())
    }

    fn list_tree(&self, commit_id: &str) -> Result<TreeListing> {
        let commit = self.find_commit(commit_id)?;
        let tree = commit
            .tree()
            .map_err(|e| TallyError::Git(format!("failed to get commit tree: {e}")))?;

        let mut listing = TreeListing::default();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            let kind = match entry.kind() {
                Some(ObjectType::Blob) => ObjectKind::Blob,
                Some(ObjectType::Tree) => ObjectKind::Tree,
                Some(ObjectType::Commit) => ObjectKind::Commit,
                _ => return TreeWalkResult::Ok,
            };
            let name = String::from_utf8_lossy(entry.name_bytes());
            listing.insert(
                format!("{root}{name}"),
                TreeEntry {
                    kind,
                    mode: format!("{:06o}", entry.filemode()),
                },
            );
            TreeWalkResult::Ok
        })
        .map_err(|e| TallyError::Git(format!("failed to walk tree: {e}")))?;

        Ok(listing)
    }
}

fn to_datetime(time: git2::Time) -> Result<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).ok_or_else(|| {
        TallyError::Git(format!("invalid timezone offset: {}", time.offset_minutes()))
    })?;
    DateTime::from_timestamp(time.seconds(), 0)
        .map(|utc| utc.with_timezone(&offset))
        .ok_or_else(|| TallyError::Git(format!("invalid commit timestamp: {}", time.seconds())))
}

/// List the repositories directly below `dir`, sorted by path.
///
/// A subdirectory counts as a repository when it holds a `.git` entry or a
/// `HEAD` file. Hidden subdirectories are not considered. When no subdirectory qualifies but `dir` itself does, `dir`
/// is returned on its own.
///
/// # Errors
///
/// Returns [`TallyError::FileNotFound`] if `dir` does not exist and
/// [`TallyError::Io`] if it cannot be listed.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use tally_gitpulse::mining::discover_repositories;
///
/// for repo in discover_repositories(Path::new("/home/me/src")).unwrap() {
///     println!("{}", repo.display());
/// }
/// ```
pub fn discover_repositories(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TallyError::FileNotFound(dir.to_path_buf()));
    }

    let mut repos = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_hidden(&path) {
            continue;
        }
        if path.is_dir() && looks_like_repository(&path) {
            repos.push(path);
        }
    }
    repos.sort();

    if repos.is_empty() && looks_like_repository(dir) {
        repos.push(dir.to_path_buf());
    }

    Ok(repos)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

fn looks_like_repository(path: &Path) -> bool {
    path.join(".git").exists() || path.join("HEAD").is_file()
}
