//! Report rendering.
//!
//! Turns [`ContributionStats`] into the JSON document written at the end of
//! a run. Monthly series are densified over a continuous month scale so
//! charts show quiet months as zeros.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_core::Result;

use crate::buckets::{
    AnalysisMetadata, ContributionStats, HourHistogram, LanguageStats, WeekdayHours, YearMonth,
};

/// Commits in one month of the scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthCommits {
    /// Label such as `Mar-2021`.
    pub month: String,
    pub commits: u64,
}

/// Line changes in one month of the scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthLines {
    /// Label such as `Mar-2021`.
    pub month: String,
    pub added: u64,
    pub deleted: u64,
}

/// The serialized report.
///
/// Field names are part of the output format consumed by existing
/// dashboards, including the singular `commit_by_weekday_hour`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionReport {
    pub commits_total: u64,
    pub commits_by_month: Vec<MonthCommits>,
    pub commits_by_hour: HourHistogram,
    /// Keyed by `YYYY-MM-DD`.
    pub commits_by_day: BTreeMap<String, u64>,
    pub commit_by_weekday_hour: WeekdayHours,
    pub lines_by_language: BTreeMap<String, LanguageStats>,
    pub lines_by_month: Vec<MonthLines>,
    pub analysis_metadata: AnalysisMetadata,
}

impl ContributionReport {
    /// Serialize to JSON, indented when `pretty` is set.
    ///
    /// Both forms decode to the same value.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Serialization`](tally_core::TallyError::Serialization) if serialization fails.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// Every month from the first to the last key of `commits_by_month`,
/// inclusive. Empty when no commit was recorded.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use tally_gitpulse::buckets::YearMonth;
/// use tally_gitpulse::report::month_scale;
///
/// let mut months = BTreeMap::new();
/// months.insert(YearMonth::new(2021, 3).unwrap(), 2);
/// months.insert(YearMonth::new(2021, 5).unwrap(), 1);
///
/// let labels: Vec<String> = month_scale(&months).into_iter().map(|m| m.label()).collect();
/// assert_eq!(labels, vec!["Mar-2021", "Apr-2021", "May-2021"]);
/// ```
pub fn month_scale(commits_by_month: &BTreeMap<YearMonth, u64>) -> Vec<YearMonth> {
    let (Some(first), Some(last)) = (
        commits_by_month.keys().next(),
        commits_by_month.keys().next_back(),
    ) else {
        return Vec::new();
    };

    let mut scale = Vec::new();
    let mut month = *first;
    while month <= *last {
        scale.push(month);
        month = month.next();
    }
    scale
}

/// Build the report for `stats`.
///
/// Months on the scale without data are reported as zero.
pub fn format_report(stats: &ContributionStats) -> ContributionReport {
    let scale = month_scale(&stats.commits_by_month);

    let commits_by_month = scale
        .iter()
        .map(|month| MonthCommits {
            month: month.label(),
            commits: stats.commits_by_month.get(month).copied().unwrap_or(0),
        })
        .collect();

    let lines_by_month = scale
        .iter()
        .map(|month| {
            let lines = stats.lines_by_month.get(month).copied().unwrap_or_default();
            MonthLines {
                month: month.label(),
                added: lines.added,
                deleted: lines.deleted,
            }
        })
        .collect();

    let commits_by_day = stats
        .commits_by_day
        .iter()
        .map(|(day, count)| (day.format("%Y-%m-%d").to_string(), *count))
        .collect();

    ContributionReport {
        commits_total: stats.commits_total,
        commits_by_month,
        commits_by_hour: stats.commits_by_hour.clone(),
        commits_by_day,
        commit_by_weekday_hour: stats.commits_by_weekday_hour.clone(),
        lines_by_language: stats.lines_by_language.clone(),
        lines_by_month,
        analysis_metadata: stats.metadata,
    }
}
