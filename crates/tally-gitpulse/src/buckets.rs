//! Accumulator types filled by the aggregator.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tally_core::LineCounts;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Commit counts keyed by hour of day, `0..=23`.
pub type HourHistogram = BTreeMap<u32, u64>;

/// A histogram with every hour present and zeroed.
pub fn empty_hours() -> HourHistogram {
    (0..24).map(|hour| (hour, 0)).collect()
}

/// A calendar month, ordered chronologically.
///
/// # Examples
///
/// ```
/// use tally_gitpulse::buckets::YearMonth;
///
/// let march = YearMonth::new(2021, 3).unwrap();
/// assert_eq!(march.to_string(), "2021-03");
/// assert_eq!(march.label(), "Mar-2021");
/// assert_eq!(YearMonth::new(2021, 12).unwrap().next().to_string(), "2022-01");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Build a month, rejecting anything outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month containing `date`.
    pub fn of<D: Datelike>(date: &D) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following month.
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Display label such as `Mar-2021`.
    pub fn label(self) -> String {
        let index = (self.month - 1) as usize;
        format!("{}-{}", MONTH_ABBREVIATIONS[index], self.year)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Commit counts per weekday and hour, always a full 7×24 grid.
///
/// # Examples
///
/// ```
/// use chrono::Weekday;
/// use tally_gitpulse::buckets::WeekdayHours;
///
/// let mut grid = WeekdayHours::default();
/// grid.increment(Weekday::Thu, 9);
/// assert_eq!(grid.row(Weekday::Thu)[&9], 1);
/// assert_eq!(grid.row(Weekday::Sun).len(), 24);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayHours {
    #[serde(rename = "Mon")]
    pub mon: HourHistogram,
    #[serde(rename = "Tue")]
    pub tue: HourHistogram,
    #[serde(rename = "Wed")]
    pub wed: HourHistogram,
    #[serde(rename = "Thu")]
    pub thu: HourHistogram,
    #[serde(rename = "Fri")]
    pub fri: HourHistogram,
    #[serde(rename = "Sat")]
    pub sat: HourHistogram,
    #[serde(rename = "Sun")]
    pub sun: HourHistogram,
}

impl Default for WeekdayHours {
    fn default() -> Self {
        Self {
            mon: empty_hours(),
            tue: empty_hours(),
            wed: empty_hours(),
            thu: empty_hours(),
            fri: empty_hours(),
            sat: empty_hours(),
            sun: empty_hours(),
        }
    }
}

impl WeekdayHours {
    /// Hours for one weekday.
    pub fn row(&self, weekday: Weekday) -> &HourHistogram {
        match weekday {
            Weekday::Mon => &self.mon,
            Weekday::Tue => &self.tue,
            Weekday::Wed => &self.wed,
            Weekday::Thu => &self.thu,
            Weekday::Fri => &self.fri,
            Weekday::Sat => &self.sat,
            Weekday::Sun => &self.sun,
        }
    }

    fn row_mut(&mut self, weekday: Weekday) -> &mut HourHistogram {
        match weekday {
            Weekday::Mon => &mut self.mon,
            Weekday::Tue => &mut self.tue,
            Weekday::Wed => &mut self.wed,
            Weekday::Thu => &mut self.thu,
            Weekday::Fri => &mut self.fri,
            Weekday::Sat => &mut self.sat,
            Weekday::Sun => &mut self.sun,
        }
    }

    /// Count one commit at `hour` on `weekday`.
    pub fn increment(&mut self, weekday: Weekday, hour: u32) {
        *self.row_mut(weekday).entry(hour).or_insert(0) += 1;
    }

    /// Sum over the whole grid.
    pub fn total(&self) -> u64 {
        [
            &self.mon, &self.tue, &self.wed, &self.thu, &self.fri, &self.sat, &self.sun,
        ]
        .iter()
        .flat_map(|row| row.values())
        .sum()
    }
}

/// Per-language totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    /// Lines added in files of this language.
    pub added: u64,
    /// Lines deleted in files of this language.
    pub deleted: u64,
    /// Commits touching at least one file of this language.
    pub commits: u64,
}

/// Bookkeeping about the run itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Unix seconds at which the aggregator was created.
    pub started_at: i64,
    /// Repositories whose history was walked to the end.
    pub repositories_analyzed: u64,
    /// Wall-clock milliseconds spent walking those repositories.
    pub ms_spent: u64,
}

/// Everything accumulated across repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionStats {
    pub commits_total: u64,
    /// Keyed by the committer timestamp's month.
    pub commits_by_month: BTreeMap<YearMonth, u64>,
    /// Keyed by the author timestamp's hour; all 24 hours present.
    pub commits_by_hour: HourHistogram,
    /// Keyed by the author timestamp's date.
    pub commits_by_day: BTreeMap<NaiveDate, u64>,
    pub commits_by_weekday_hour: WeekdayHours,
    pub lines_by_language: BTreeMap<String, LanguageStats>,
    /// Keyed by the committer timestamp's month.
    pub lines_by_month: BTreeMap<YearMonth, LineCounts>,
    pub metadata: AnalysisMetadata,
}

impl ContributionStats {
    /// Empty statistics with the hour grids pre-populated.
    pub fn new(started_at: i64) -> Self {
        Self {
            commits_total: 0,
            commits_by_month: BTreeMap::new(),
            commits_by_hour: empty_hours(),
            commits_by_day: BTreeMap::new(),
            commits_by_weekday_hour: WeekdayHours::default(),
            lines_by_language: BTreeMap::new(),
            lines_by_month: BTreeMap::new(),
            metadata: AnalysisMetadata {
                started_at,
                ..AnalysisMetadata::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_month_orders_chronologically() {
        let dec = YearMonth::new(2020, 12).unwrap();
        let jan = YearMonth::new(2021, 1).unwrap();
        let feb = YearMonth::new(2021, 2).unwrap();
        assert!(dec < jan && jan < feb);
        assert_eq!(dec.next(), jan);
    }

    #[test]
    fn year_month_rejects_bad_month() {
        assert!(YearMonth::new(2021, 0).is_none());
        assert!(YearMonth::new(2021, 13).is_none());
    }

    #[test]
    fn year_month_from_date() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        assert_eq!(YearMonth::of(&date).to_string(), "2021-03");
        assert_eq!(YearMonth::of(&date).label(), "Mar-2021");
    }

    #[test]
    fn weekday_grid_is_full_and_zeroed() {
        let grid = WeekdayHours::default();
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert_eq!(grid.row(weekday).len(), 24);
        }
        assert_eq!(grid.total(), 0);
    }

    #[test]
    fn weekday_grid_serializes_with_day_names_in_order() {
        let json = serde_json::to_string(&WeekdayHours::default()).unwrap();
        let days: Vec<usize> = ["\"Mon\"", "\"Tue\"", "\"Wed\"", "\"Thu\"", "\"Fri\"", "\"Sat\"", "\"Sun\""]
            .iter()
            .map(|day| json.find(day).unwrap())
            .collect();
        assert!(days.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn new_stats_have_full_hour_histogram() {
        let stats = ContributionStats::new(42);
        assert_eq!(stats.commits_by_hour.len(), 24);
        assert!(stats.commits_by_hour.values().all(|count| *count == 0));
        assert_eq!(stats.metadata.started_at, 42);
        assert_eq!(stats.metadata.repositories_analyzed, 0);
    }
}
