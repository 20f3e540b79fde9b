//! Per-author commit aggregation.
//!
//! A [`CommitAggregator`] walks each repository's history through a
//! [`RepositoryAccessor`], keeps the commits authored by the configured
//! emails, and folds them into [`ContributionStats`]. Statistics accumulate
//! across every repository passed to [`CommitAggregator::parse_repo`].

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use chrono::{Datelike, Timelike, Utc};
use tally_core::{Commit, Language, Result, TallyError};
use tally_difflens::ignore::StatsIgnore;
use tally_difflens::language::{classify, is_library};
use tally_difflens::lines::count_lines;
use tally_difflens::parser::parse_unified_diff;

use crate::buckets::{ContributionStats, YearMonth};
use crate::mining::RepositoryAccessor;
use crate::report::{format_report, ContributionReport};

/// Outcome of walking one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositorySummary {
    /// Commits returned by the log.
    pub commits_walked: usize,
    /// Commits authored by one of the configured emails.
    pub commits_matched: usize,
    /// Milliseconds spent on the walk.
    pub elapsed_ms: u64,
}

/// Accumulates contribution statistics for a fixed set of author emails.
///
/// # Examples
///
/// ```
/// use tally_gitpulse::aggregate::CommitAggregator;
///
/// let aggregator = CommitAggregator::new(["me@example.com"]).unwrap();
/// assert_eq!(aggregator.stats().commits_total, 0);
/// assert!(CommitAggregator::new(Vec::<String>::new()).is_err());
/// ```
#[derive(Debug)]
pub struct CommitAggregator {
    authors: HashSet<String>,
    ignore: StatsIgnore,
    stats: ContributionStats,
}

impl CommitAggregator {
    /// Create an aggregator for `authors`, compared verbatim against each
    /// commit's author email.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Config`] if `authors` is empty.
    pub fn new<I, S>(authors: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let authors: HashSet<String> = authors.into_iter().map(Into::into).collect();
        if authors.is_empty() {
            return Err(TallyError::Config(
                "at least one author email is required".into(),
            ));
        }

        Ok(Self {
            authors,
            ignore: StatsIgnore::default(),
            stats: ContributionStats::new(Utc::now().timestamp()),
        })
    }

    /// Skip files matched by `ignore`.
    pub fn with_ignore(mut self, ignore: StatsIgnore) -> Self {
        self.ignore = ignore;
        self
    }

    /// Statistics accumulated so far.
    pub fn stats(&self) -> &ContributionStats {
        &self.stats
    }

    /// Render the accumulated statistics.
    pub fn report(&self) -> ContributionReport {
        format_report(&self.stats)
    }

    /// Walk every commit of `repo` and fold the matching ones in.
    ///
    /// Metadata is updated once the walk completes, even when no commit
    /// matched. If the walk fails the statistics are left as they were
    /// before the call.
    ///
    /// # Errors
    ///
    /// Propagates accessor failures (log, diff, tree listing) and diff
    /// parse errors. Failures to read file content for language sniffing
    /// are logged and do not abort the walk.
    pub fn parse_repo<A>(&mut self, repo: &A) -> Result<RepositorySummary>
    where
        A: RepositoryAccessor + ?Sized,
    {
        let started = Instant::now();
        let snapshot = self.stats.clone();

        let walked = self.walk(repo);
        let (commits_walked, commits_matched) = match walked {
            Ok(counts) => counts,
            Err(e) => {
                self.stats = snapshot;
                return Err(e);
            }
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.stats.metadata.repositories_analyzed += 1;
        self.stats.metadata.ms_spent += elapsed_ms;

        tracing::debug!(
            commits_walked,
            commits_matched,
            elapsed_ms,
            "repository walked"
        );

        Ok(RepositorySummary {
            commits_walked,
            commits_matched,
            elapsed_ms,
        })
    }

    fn walk<A>(&mut self, repo: &A) -> Result<(usize, usize)>
    where
        A: RepositoryAccessor + ?Sized,
    {
        let commits = repo.log_commits()?;
        let mut matched = 0;
        for commit in &commits {
            if self.record_commit(repo, commit)? {
                matched += 1;
            }
        }
        Ok((commits.len(), matched))
    }

    /// Fold a single commit in. Returns `false` when the author is not one
    /// of the configured emails.
    ///
    /// # Errors
    ///
    /// Propagates diff and tree listing failures.
    pub fn record_commit<A>(&mut self, repo: &A, commit: &Commit) -> Result<bool>
    where
        A: RepositoryAccessor + ?Sized,
    {
        if !self.authors.contains(&commit.author_email) {
            return Ok(false);
        }

        let authored = commit.authored_at;
        let month = YearMonth::of(&commit.committed_at);

        let diff = repo.show_diff(&commit.hash)?;
        let tree = repo.list_tree(&commit.hash)?;
        let files = parse_unified_diff(&diff)?;

        let stats = &mut self.stats;
        *stats.commits_by_hour.entry(authored.hour()).or_insert(0) += 1;
        *stats.commits_by_day.entry(authored.date_naive()).or_insert(0) += 1;
        stats
            .commits_by_weekday_hour
            .increment(authored.weekday(), authored.hour());

        let mut touched = BTreeSet::new();
        for file in &files {
            let path = file.path();
            if tree.is_submodule(path)
                || tree.is_symlink(path)
                || is_library(path)
                || self.ignore.matches_filename(path)
            {
                continue;
            }

            let Language::Labeled(label) = classify(path, &commit.hash, repo) else {
                continue;
            };

            let counts = count_lines(&file.body());
            let language = stats.lines_by_language.entry(label.clone()).or_default();
            language.added += counts.added;
            language.deleted += counts.deleted;
            *stats.lines_by_month.entry(month).or_default() += counts;
            touched.insert(label);
        }

        for label in &touched {
            if let Some(language) = stats.lines_by_language.get_mut(label) {
                language.commits += 1;
            }
        }

        *stats.commits_by_month.entry(month).or_insert(0) += 1;
        stats.commits_total += 1;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use chrono::{DateTime, NaiveDate, Weekday};
    use tally_core::{ContentSource, LineCounts, ObjectKind, TreeEntry, TreeListing};

    use super::*;

    #[derive(Default)]
    struct FakeRepo {
        commits: Vec<Commit>,
        diffs: HashMap<String, String>,
        trees: HashMap<String, TreeListing>,
        blobs: HashMap<(String, String), String>,
        fail_log: bool,
        fail_diff_for: Option<String>,
        blob_reads: Cell<usize>,
    }

    impl FakeRepo {
        fn add(&mut self, hash: &str, email: &str, authored: &str, committed: &str, diff: &str) {
            self.commits.push(Commit {
                hash: hash.into(),
                author_email: email.into(),
                authored_at: DateTime::parse_from_rfc3339(authored).unwrap(),
                committed_at: DateTime::parse_from_rfc3339(committed).unwrap(),
            });
            self.diffs.insert(hash.into(), diff.into());
        }

        fn tree_entry(&mut self, hash: &str, path: &str, kind: ObjectKind, mode: &str) {
            self.trees.entry(hash.into()).or_default().insert(
                path,
                TreeEntry {
                    kind,
                    mode: mode.into(),
                },
            );
        }
    }

    impl ContentSource for FakeRepo {
        fn read_blob(&self, revision: &str, path: &str) -> Result<String> {
            self.blob_reads.set(self.blob_reads.get() + 1);
            self.blobs
                .get(&(revision.to_string(), path.to_string()))
                .cloned()
                .ok_or_else(|| TallyError::Git(format!("{path} missing at {revision}")))
        }
    }

    impl RepositoryAccessor for FakeRepo {
        fn log_commits(&self) -> Result<Vec<Commit>> {
            if self.fail_log {
                return Err(TallyError::Git("log failed".into()));
            }
            Ok(self.commits.clone())
        }

        fn show_diff(&self, commit_id: &str) -> Result<String> {
            if self.fail_diff_for.as_deref() == Some(commit_id) {
                return Err(TallyError::Git("diff failed".into()));
            }
            Ok(self.diffs.get(commit_id).cloned().unwrap_or_default())
        }

        fn list_tree(&self, commit_id: &str) -> Result<TreeListing> {
            Ok(self.trees.get(commit_id).cloned().unwrap_or_default())
        }
    }

    fn added_file(path: &str, lines: &[&str]) -> String {
        let mut diff = format!(
            "diff --git a/{path} b/{path}\nnew file mode 100644\n--- /dev/null\n+++ b/{path}\n@@ -0,0 +1,{} @@\n",
            lines.len()
        );
        for line in lines {
            diff.push('+');
            diff.push_str(line);
            diff.push('\n');
        }
        diff
    }

    const ME: &str = "me@example.com";

    #[test]
    fn empty_author_set_is_rejected() {
        let err = CommitAggregator::new(Vec::<&str>::new()).unwrap_err();
        assert!(matches!(err, TallyError::Config(_)));
    }

    #[test]
    fn other_authors_are_ignored() {
        let mut repo = FakeRepo::default();
        repo.add(
            "c1",
            "someone@else.com",
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &added_file("main.go", &["package main"]),
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        let summary = aggregator.parse_repo(&repo).unwrap();

        assert_eq!(summary.commits_walked, 1);
        assert_eq!(summary.commits_matched, 0);
        assert_eq!(aggregator.stats().commits_total, 0);
        assert!(aggregator.stats().lines_by_language.is_empty());
        assert_eq!(aggregator.stats().metadata.repositories_analyzed, 1);
    }

    #[test]
    fn author_match_is_exact() {
        let mut repo = FakeRepo::default();
        repo.add(
            "c1",
            "Me@Example.com",
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            "",
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();
        assert_eq!(aggregator.stats().commits_total, 0);
    }

    #[test]
    fn time_buckets_follow_author_timestamp() {
        let mut repo = FakeRepo::default();
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-04-01T01:00:00+02:00",
            "",
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();
        let stats = aggregator.stats();

        assert_eq!(stats.commits_total, 1);
        assert_eq!(stats.commits_by_hour[&9], 1);
        assert_eq!(stats.commits_by_hour.values().sum::<u64>(), 1);
        assert_eq!(
            stats.commits_by_day[&NaiveDate::from_ymd_opt(2021, 3, 4).unwrap()],
            1
        );
        assert_eq!(stats.commits_by_weekday_hour.row(Weekday::Thu)[&9], 1);
        assert_eq!(stats.commits_by_weekday_hour.total(), 1);
    }

    #[test]
    fn month_buckets_follow_committer_timestamp() {
        let mut repo = FakeRepo::default();
        repo.add(
            "c1",
            ME,
            "2021-03-31T23:30:00+00:00",
            "2021-04-01T01:00:00+02:00",
            &added_file("main.go", &["package main"]),
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();
        let stats = aggregator.stats();
        let april = YearMonth::new(2021, 4).unwrap();

        assert_eq!(stats.commits_by_month.keys().collect::<Vec<_>>(), vec![&april]);
        assert_eq!(stats.lines_by_month[&april], LineCounts { added: 1, deleted: 0 });
        assert_eq!(
            stats.commits_by_day.keys().next().unwrap().to_string(),
            "2021-03-31"
        );
    }

    #[test]
    fn language_commit_counted_once_per_commit() {
        let mut repo = FakeRepo::default();
        let diff = added_file("a.go", &["package a", "func A() {}"])
            + &added_file("b.go", &["package b"])
            + &added_file("notes.md", &["# notes"]);
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &diff,
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();
        let languages = &aggregator.stats().lines_by_language;

        assert_eq!(languages["Golang"].added, 3);
        assert_eq!(languages["Golang"].commits, 1);
        assert_eq!(languages["Markdown"].commits, 1);
        assert!(languages.values().map(|l| l.commits).sum::<u64>() <= 2);
    }

    #[test]
    fn submodules_symlinks_and_libraries_are_skipped() {
        let mut repo = FakeRepo::default();
        let diff = added_file("vendor/dep", &["Subproject commit 4f2a9c1"])
            + &added_file("link.py", &["target.py"])
            + &added_file("static/js/jquery.js", &["(function(){})()"])
            + &added_file("app.py", &["print(1)"]);
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &diff,
        );
        repo.tree_entry("c1", "vendor/dep", ObjectKind::Commit, "160000");
        repo.tree_entry("c1", "link.py", ObjectKind::Blob, "120000");
        repo.tree_entry("c1", "app.py", ObjectKind::Blob, "100644");

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();
        let stats = aggregator.stats();

        assert_eq!(stats.lines_by_language.len(), 1);
        assert_eq!(stats.lines_by_language["Python"].added, 1);
        assert_eq!(stats.lines_by_language["Python"].commits, 1);
        assert_eq!(stats.commits_total, 1);
    }

    #[test]
    fn quoted_non_ascii_paths_are_skipped_like_any_other() {
        let mut repo = FakeRepo::default();
        let diff = concat!(
            "diff --git \"a/li\\303\\251n.py\" \"b/li\\303\\251n.py\"\n",
            "new file mode 120000\n",
            "--- /dev/null\n",
            "+++ \"b/li\\303\\251n.py\"\n",
            "@@ -0,0 +1 @@\n",
            "+app.py\n",
            "\\ No newline at end of file\n",
            "diff --git \"a/g\\303\\251n\\303\\251r\\303\\251.py\" \"b/g\\303\\251n\\303\\251r\\303\\251.py\"\n",
            "new file mode 100644\n",
            "--- /dev/null\n",
            "+++ \"b/g\\303\\251n\\303\\251r\\303\\251.py\"\n",
            "@@ -0,0 +1 @@\n",
            "+x = 1\n",
        )
        .to_string()
            + &added_file("app.py", &["print(1)"]);
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &diff,
        );
        repo.tree_entry("c1", "lién.py", ObjectKind::Blob, "120000");
        repo.tree_entry("c1", "généré.py", ObjectKind::Blob, "100644");
        repo.tree_entry("c1", "app.py", ObjectKind::Blob, "100644");

        let mut aggregator = CommitAggregator::new([ME])
            .unwrap()
            .with_ignore(StatsIgnore::new(Some("généré.py\n")));
        aggregator.parse_repo(&repo).unwrap();
        let stats = aggregator.stats();

        assert_eq!(stats.lines_by_language.len(), 1);
        assert_eq!(stats.lines_by_language["Python"].added, 1);
        assert_eq!(stats.commits_total, 1);
    }

    #[test]
    fn ignored_paths_are_skipped() {
        let mut repo = FakeRepo::default();
        let diff = added_file("dist/bundle.py", &["x = 1"]) + &added_file("app.py", &["y = 2"]);
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &diff,
        );

        let mut aggregator = CommitAggregator::new([ME])
            .unwrap()
            .with_ignore(StatsIgnore::new(Some("/dist\n")));
        aggregator.parse_repo(&repo).unwrap();

        assert_eq!(aggregator.stats().lines_by_language["Python"].added, 1);
    }

    #[test]
    fn unreadable_content_skips_file_but_keeps_commit() {
        let mut repo = FakeRepo::default();
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &added_file("Procfile", &["web: run"]),
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();
        let stats = aggregator.stats();

        assert_eq!(repo.blob_reads.get(), 1);
        assert!(stats.lines_by_language.is_empty());
        assert!(stats.lines_by_month.is_empty());
        assert_eq!(stats.commits_total, 1);
        assert_eq!(stats.commits_by_month.len(), 1);
    }

    #[test]
    fn content_sniffing_labels_extensionless_scripts() {
        let mut repo = FakeRepo::default();
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &added_file("deploy", &["#!/usr/bin/perl", "print 1;"]),
        );
        repo.blobs.insert(
            ("c1".into(), "deploy".into()),
            "#!/usr/bin/perl\nprint 1;\n".into(),
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();

        assert_eq!(aggregator.stats().lines_by_language["Perl"].added, 2);
    }

    #[test]
    fn deletions_use_the_old_path() {
        let mut repo = FakeRepo::default();
        let diff = "diff --git a/old.rb b/old.rb\ndeleted file mode 100644\n--- a/old.rb\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-puts 1\n-puts 2\n";
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            diff,
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();
        let ruby = aggregator.stats().lines_by_language["Ruby"];

        assert_eq!(ruby.deleted, 2);
        assert_eq!(ruby.commits, 1);
    }

    #[test]
    fn metadata_counts_repositories_without_matches() {
        let repo = FakeRepo::default();
        let mut aggregator = CommitAggregator::new([ME]).unwrap();

        aggregator.parse_repo(&repo).unwrap();
        aggregator.parse_repo(&repo).unwrap();

        let stats = aggregator.stats();
        assert_eq!(stats.metadata.repositories_analyzed, 2);
        assert_eq!(stats.commits_total, 0);
        assert_eq!(stats.commits_by_hour.len(), 24);
        assert_eq!(stats.commits_by_weekday_hour.row(Weekday::Sun).len(), 24);
    }

    #[test]
    fn statistics_accumulate_across_repositories() {
        let mut first = FakeRepo::default();
        first.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &added_file("a.go", &["package a"]),
        );
        let mut second = FakeRepo::default();
        second.add(
            "c2",
            ME,
            "2021-05-10T14:00:00-07:00",
            "2021-05-10T14:00:00-07:00",
            &added_file("b.go", &["package b"]),
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&first).unwrap();
        aggregator.parse_repo(&second).unwrap();
        let stats = aggregator.stats();

        assert_eq!(stats.commits_total, 2);
        assert_eq!(stats.lines_by_language["Golang"].commits, 2);
        assert_eq!(stats.commits_by_weekday_hour.row(Weekday::Mon)[&14], 1);
        assert_eq!(stats.metadata.repositories_analyzed, 2);
    }

    #[test]
    fn failed_log_leaves_stats_untouched() {
        let repo = FakeRepo {
            fail_log: true,
            ..FakeRepo::default()
        };
        let mut aggregator = CommitAggregator::new([ME]).unwrap();

        let err = aggregator.parse_repo(&repo).unwrap_err();
        assert!(matches!(err, TallyError::Git(_)));
        assert_eq!(aggregator.stats().metadata.repositories_analyzed, 0);
    }

    #[test]
    fn failure_mid_walk_rolls_back_partial_results() {
        let mut repo = FakeRepo::default();
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &added_file("a.go", &["package a"]),
        );
        repo.add(
            "c2",
            ME,
            "2021-03-05T09:15:00+01:00",
            "2021-03-05T09:15:00+01:00",
            &added_file("b.go", &["package b"]),
        );
        repo.fail_diff_for = Some("c2".into());

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        assert!(aggregator.parse_repo(&repo).is_err());

        let stats = aggregator.stats();
        assert_eq!(stats.commits_total, 0);
        assert!(stats.lines_by_language.is_empty());
        assert_eq!(stats.commits_by_hour.values().sum::<u64>(), 0);
    }

    #[test]
    fn report_reflects_accumulated_stats() {
        let mut repo = FakeRepo::default();
        repo.add(
            "c1",
            ME,
            "2021-03-04T09:15:00+01:00",
            "2021-03-04T09:15:00+01:00",
            &added_file("a.go", &["package a"]),
        );

        let mut aggregator = CommitAggregator::new([ME]).unwrap();
        aggregator.parse_repo(&repo).unwrap();
        let report = aggregator.report();

        assert_eq!(report.commits_total, 1);
        assert_eq!(report.commits_by_month.len(), 1);
        assert_eq!(report.commits_by_month[0].month, "Mar-2021");
    }
}
