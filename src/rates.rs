use crate::model::{AttendanceRecord, AttendanceStatus, Student};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

pub const TOP_PERFORMER_RATE: u32 = 95;
pub const TOP_PERFORMER_MIN_RECORDS: usize = 5;
pub const HIGHLIGHT_LIST_CAP: usize = 5;
pub const TREND_DAYS: u64 = 7;

/// Reported for a student with no records at all.
pub const NO_DATA_RATE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
}

impl StatusCounts {
    pub fn tally<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        let mut counts = Self::default();
        for r in records {
            counts.add(r.status);
        }
        counts
    }

    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.present + self.absent + self.late + self.excused
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RateLabel {
    /// No records yet; the rate is the fixed sentinel.
    New,
    Measured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRate {
    pub rate: u32,
    pub label: RateLabel,
    pub total: usize,
    pub counts: StatusCounts,
}

/// `round((present + excused + 0.5 * late) / total * 100)`, half-up.
///
/// Worked in half-units so no float rounding is involved:
/// with `h = 2 * (present + excused) + late` the rate is
/// `floor((100 * h + total) / (2 * total))`.
pub fn rate_from_counts(counts: StatusCounts) -> AttendanceRate {
    let total = counts.total();
    if total == 0 {
        return AttendanceRate {
            rate: NO_DATA_RATE,
            label: RateLabel::New,
            total,
            counts,
        };
    }
    let halves = 2 * (counts.present + counts.excused) + counts.late;
    let rate = (100 * halves + total) / (2 * total);
    AttendanceRate {
        rate: rate as u32,
        label: RateLabel::Measured,
        total,
        counts,
    }
}

pub fn compute_rate<'a, I>(records: I) -> AttendanceRate
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    rate_from_counts(StatusCounts::tally(records))
}

pub fn is_at_risk(rate: &AttendanceRate, threshold: u32) -> bool {
    rate.rate < threshold
}

pub fn is_top_performer(rate: &AttendanceRate) -> bool {
    rate.rate >= TOP_PERFORMER_RATE && rate.total >= TOP_PERFORMER_MIN_RECORDS
}

/// Achievement marks shown on a student's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Badge {
    /// Rate 100 over more than five records.
    Perfect,
    /// Rate from 90 up to, not including, 100.
    Distinguished,
    /// No lates over more than five records.
    Punctual,
    /// Rate above 85 over more than twenty records.
    Persistent,
}

pub fn badges(rate: &AttendanceRate) -> Vec<Badge> {
    let mut out = Vec::new();
    if rate.label == RateLabel::New {
        return out;
    }
    if rate.rate == 100 && rate.total > 5 {
        out.push(Badge::Perfect);
    }
    if (90..100).contains(&rate.rate) {
        out.push(Badge::Distinguished);
    }
    if rate.counts.late == 0 && rate.total > 5 {
        out.push(Badge::Punctual);
    }
    if rate.total > 20 && rate.rate > 85 {
        out.push(Badge::Persistent);
    }
    out
}

/// Roster filter on a student's rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Standing {
    /// Below the attendance threshold.
    Risk,
    /// At or above the top cutoff, whatever the record count.
    Excellent,
}

impl Standing {
    pub fn matches(self, rate: &AttendanceRate, threshold: u32) -> bool {
        match self {
            Standing::Risk => is_at_risk(rate, threshold),
            Standing::Excellent => rate.rate >= TOP_PERFORMER_RATE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRate {
    pub student_id: String,
    pub name: String,
    pub grade: String,
    #[serde(flatten)]
    pub rate: AttendanceRate,
}

pub fn student_rates(students: &[Student], records: &[AttendanceRecord]) -> Vec<StudentRate> {
    let mut by_student: HashMap<&str, StatusCounts> = HashMap::new();
    for r in records {
        by_student.entry(r.student_id.as_str()).or_default().add(r.status);
    }
    students
        .iter()
        .map(|s| StudentRate {
            student_id: s.id.clone(),
            name: s.name.clone(),
            grade: s.grade.clone(),
            rate: rate_from_counts(by_student.get(s.id.as_str()).copied().unwrap_or_default()),
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlights {
    pub at_risk: Vec<StudentRate>,
    pub top: Vec<StudentRate>,
}

fn by_rate_then_name(a: &StudentRate, b: &StudentRate) -> Ordering {
    a.rate
        .rate
        .cmp(&b.rate.rate)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.student_id.cmp(&b.student_id))
}

/// At-risk students worst first and top performers best first, five each.
/// A student who is both below the threshold and above the top cutoff (only
/// possible with a threshold above 95) is listed as at-risk.
pub fn classify(students: &[Student], records: &[AttendanceRecord], threshold: u32) -> Highlights {
    let mut out = Highlights::default();
    for sr in student_rates(students, records) {
        if is_at_risk(&sr.rate, threshold) {
            out.at_risk.push(sr);
        } else if is_top_performer(&sr.rate) {
            out.top.push(sr);
        }
    }
    out.at_risk.sort_by(by_rate_then_name);
    out.at_risk.truncate(HIGHLIGHT_LIST_CAP);
    out.top.sort_by(|a, b| {
        b.rate
            .rate
            .cmp(&a.rate.rate)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    out.top.truncate(HIGHLIGHT_LIST_CAP);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

pub fn day_summary(records: &[AttendanceRecord], date: NaiveDate) -> StatusCounts {
    StatusCounts::tally(records.iter().filter(|r| r.date == date))
}

/// One entry per calendar day for the `days` days ending at `today`, oldest
/// first. Days without records report zeros. Empty when the window would
/// leave the representable calendar.
pub fn daily_trend(records: &[AttendanceRecord], today: NaiveDate, days: u64) -> Vec<DailyStat> {
    let Some(first) = days
        .checked_sub(1)
        .and_then(|back| today.checked_sub_days(Days::new(back)))
    else {
        return Vec::new();
    };
    let mut by_day: HashMap<NaiveDate, StatusCounts> = HashMap::new();
    for r in records {
        if r.date >= first && r.date <= today {
            by_day.entry(r.date).or_default().add(r.status);
        }
    }
    first
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|date| DailyStat {
            date,
            counts: by_day.get(&date).copied().unwrap_or_default(),
        })
        .collect()
}

pub fn parse_month_key(month: &str) -> Option<(i32, u32)> {
    let (y, m) = month.trim().split_once('-')?;
    let year = y.parse::<i32>().ok()?;
    let month = m.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

pub fn days_of_month(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| d.month() == month)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRow {
    pub student_id: String,
    pub name: String,
    pub grade: String,
    pub cells: Vec<Option<AttendanceStatus>>,
    pub present: usize,
    pub late: usize,
    pub absent: usize,
    /// Own column; never folded into present in this grid.
    pub excused: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyGrid {
    pub year: i32,
    pub month: u32,
    pub days: Vec<NaiveDate>,
    pub rows: Vec<MonthlyRow>,
}

pub fn monthly_grid(
    students: &[Student],
    records: &[AttendanceRecord],
    year: i32,
    month: u32,
) -> MonthlyGrid {
    let days = days_of_month(year, month);
    let lookup: HashMap<(&str, NaiveDate), AttendanceStatus> = records
        .iter()
        .filter(|r| r.date.year() == year && r.date.month() == month)
        .map(|r| ((r.student_id.as_str(), r.date), r.status))
        .collect();

    let rows = students
        .iter()
        .map(|s| {
            let cells: Vec<Option<AttendanceStatus>> = days
                .iter()
                .map(|d| lookup.get(&(s.id.as_str(), *d)).copied())
                .collect();
            let mut counts = StatusCounts::default();
            for status in cells.iter().flatten() {
                counts.add(*status);
            }
            MonthlyRow {
                student_id: s.id.clone(),
                name: s.name.clone(),
                grade: s.grade.clone(),
                cells,
                present: counts.present,
                late: counts.late,
                absent: counts.absent,
                excused: counts.excused,
            }
        })
        .collect();

    MonthlyGrid {
        year,
        month,
        days,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(present: usize, absent: usize, late: usize, excused: usize) -> StatusCounts {
        StatusCounts {
            present,
            absent,
            late,
            excused,
        }
    }

    #[test]
    fn rate_formula_reference_case() {
        assert_eq!(rate_from_counts(counts(6, 2, 2, 0)).rate, 70);
    }

    #[test]
    fn excused_counts_as_present_in_rate() {
        assert_eq!(rate_from_counts(counts(1, 1, 0, 2)).rate, 75);
    }

    #[test]
    fn rounding_is_half_up() {
        // 1 late of 4: 12.5 -> 13
        assert_eq!(rate_from_counts(counts(0, 3, 1, 0)).rate, 13);
        // 2 of 3: 66.67 -> 67
        assert_eq!(rate_from_counts(counts(2, 1, 0, 0)).rate, 67);
        // 1 of 3: 33.33 -> 33
        assert_eq!(rate_from_counts(counts(1, 2, 0, 0)).rate, 33);
        // 1 late of 8: 6.25 -> 6
        assert_eq!(rate_from_counts(counts(0, 7, 1, 0)).rate, 6);
    }

    #[test]
    fn zero_records_is_new_sentinel() {
        let r = rate_from_counts(StatusCounts::default());
        assert_eq!(r.rate, NO_DATA_RATE);
        assert_eq!(r.label, RateLabel::New);
        assert!(!is_top_performer(&r));
    }

    #[test]
    fn badge_boundaries() {
        let marks = |c: StatusCounts| badges(&rate_from_counts(c));
        assert!(marks(StatusCounts::default()).is_empty());
        // 5 perfect records are not enough, 6 are
        assert!(marks(counts(5, 0, 0, 0)).is_empty());
        assert_eq!(marks(counts(6, 0, 0, 0)), vec![Badge::Perfect, Badge::Punctual]);
        // 9 of 10: 90 is distinguished, 89 is not
        assert_eq!(marks(counts(9, 1, 0, 0)), vec![Badge::Distinguished, Badge::Punctual]);
        assert_eq!(rate_from_counts(counts(8, 1, 0, 0)).rate, 89);
        assert_eq!(marks(counts(8, 1, 0, 0)), vec![Badge::Punctual]);
        // one late breaks punctual
        assert_eq!(marks(counts(9, 0, 1, 0)), vec![Badge::Distinguished]);
        // persistent needs more than 20 records and a rate above 85
        assert_eq!(rate_from_counts(counts(18, 3, 0, 0)).rate, 86);
        assert!(marks(counts(18, 3, 0, 0)).contains(&Badge::Persistent));
        assert_eq!(rate_from_counts(counts(34, 6, 0, 0)).rate, 85);
        assert!(!marks(counts(34, 6, 0, 0)).contains(&Badge::Persistent));
        assert!(!marks(counts(20, 0, 0, 0)).contains(&Badge::Persistent));
        assert!(marks(counts(21, 0, 0, 0)).contains(&Badge::Persistent));
    }

    #[test]
    fn standing_filters() {
        let r74 = rate_from_counts(counts(37, 13, 0, 0));
        let r75 = rate_from_counts(counts(3, 1, 0, 0));
        assert!(Standing::Risk.matches(&r74, 75));
        assert!(!Standing::Risk.matches(&r75, 75));
        assert!(Standing::Excellent.matches(&rate_from_counts(counts(19, 1, 0, 0)), 75));
        assert_eq!(rate_from_counts(counts(47, 3, 0, 0)).rate, 94);
        assert!(!Standing::Excellent.matches(&rate_from_counts(counts(47, 3, 0, 0)), 75));
        let fresh = rate_from_counts(StatusCounts::default());
        assert!(Standing::Excellent.matches(&fresh, 75));
        assert!(!Standing::Risk.matches(&fresh, 75));
    }

    #[test]
    fn days_of_month_handles_leap_years() {
        assert_eq!(days_of_month(2024, 2).len(), 29);
        assert_eq!(days_of_month(2023, 2).len(), 28);
        assert_eq!(days_of_month(2024, 4).len(), 30);
        assert!(days_of_month(2024, 13).is_empty());
        assert_eq!(parse_month_key("2024-02"), Some((2024, 2)));
        assert_eq!(parse_month_key("2024-13"), None);
    }

    #[test]
    fn trend_at_the_calendar_floor_is_empty() {
        assert!(daily_trend(&[], NaiveDate::MIN, TREND_DAYS).is_empty());
        assert!(daily_trend(&[], NaiveDate::MAX, 0).is_empty());
        let near_floor = NaiveDate::MIN + chrono::Duration::days(6);
        assert_eq!(daily_trend(&[], near_floor, TREND_DAYS).len(), 7);
    }
}
