//! Git history analysis: per-author contribution statistics.
//!
//! Reads repositories through git2, keeps the commits authored by a given
//! set of emails, and aggregates them into activity histograms (hour,
//! weekday, day, month) and per-language line counts:
//! - [`mining`]: the [`RepositoryAccessor`](mining::RepositoryAccessor)
//!   trait, its git2 implementation and repository discovery
//! - [`aggregate`]: the [`CommitAggregator`](aggregate::CommitAggregator)
//! - [`buckets`]: accumulator types
//! - [`report`]: the serialized report

pub mod aggregate;
pub mod buckets;
pub mod mining;
pub mod report;
