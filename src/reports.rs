use crate::access::Session;
use crate::error::AccessError;
use crate::exchange::{export_attendance_csv, export_monthly_csv};
use crate::model::{AttendanceRecord, Permission, Student};
use crate::rates::{classify, daily_trend, day_summary, monthly_grid, DailyStat, Highlights, MonthlyGrid, TREND_DAYS};
use crate::store::Store;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub student_count: usize,
    pub today: DailyStat,
    /// Oldest first, ending at `today`.
    pub trend: Vec<DailyStat>,
    pub highlights: Highlights,
    pub attendance_threshold: u32,
}

fn cohort(session: &Session, store: &Store, grade: Option<&str>) -> (Vec<Student>, Vec<AttendanceRecord>) {
    let mut students = session.students(store);
    let mut records = session.records(store);
    if let Some(g) = grade {
        students.retain(|s| s.grade == g);
        let ids: HashSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
        records.retain(|r| ids.contains(r.student_id.as_str()));
    }
    (students, records)
}

pub fn dashboard(store: &Store, session: &Session, today: NaiveDate) -> Result<Dashboard, AccessError> {
    session.require(Permission::ViewDashboard, "view the dashboard")?;
    let (students, records) = cohort(session, store, None);
    let threshold = store.settings().attendance_threshold;
    Ok(Dashboard {
        student_count: students.len(),
        today: DailyStat {
            date: today,
            counts: day_summary(&records, today),
        },
        trend: daily_trend(&records, today, TREND_DAYS),
        highlights: classify(&students, &records, threshold),
        attendance_threshold: threshold,
    })
}

pub fn daily_summary(store: &Store, session: &Session, date: NaiveDate) -> Result<DailyStat, AccessError> {
    session.require(Permission::ViewReports, "view reports")?;
    Ok(DailyStat {
        date,
        counts: day_summary(&session.records(store), date),
    })
}

/// Month grid over the visible students, optionally one cohort, by name.
pub fn monthly_report(
    store: &Store,
    session: &Session,
    year: i32,
    month: u32,
    grade: Option<&str>,
) -> Result<MonthlyGrid, AccessError> {
    session.require(Permission::ViewReports, "view reports")?;
    let (mut students, records) = cohort(session, store, grade);
    students.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(monthly_grid(&students, &records, year, month))
}

pub fn monthly_report_csv(
    store: &Store,
    session: &Session,
    year: i32,
    month: u32,
    grade: Option<&str>,
) -> anyhow::Result<String> {
    let grid = monthly_report(store, session, year, month, grade)?;
    export_monthly_csv(&grid)
}

/// Every visible record, newest day first. School and student scopes never
/// see records of removed students; an unscoped session built by a library
/// caller exports them under a placeholder name.
pub fn attendance_csv(store: &Store, session: &Session) -> anyhow::Result<String> {
    session.require(Permission::ViewReports, "view reports")?;
    let students = store.students(None);
    let mut records = session.records(store);
    records.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.student_id.cmp(&b.student_id)));
    export_attendance_csv(&students, &records)
}
