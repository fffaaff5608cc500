use crate::access::{Scope, Session};
use crate::error::{AccessError, ServiceError, StoreError};
use crate::model::{AttendanceRecord, AttendanceStatus, Permission, RecordKey, Student};
use crate::rates::{badges, compute_rate, AttendanceRate, Badge};
use crate::roster::{list_students, StudentFilter};
use crate::store::{Staged, Store};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSummary {
    /// Distinct `(studentId, date)` pairs written.
    pub written: usize,
    /// How many of those replaced an existing record.
    pub superseded: usize,
    /// Submissions dropped because they fell outside the caller's school.
    pub rejected: usize,
}

/// Retained records are those with no key match in `incoming`; the result is
/// retained plus incoming. Inside one batch the last submission for a key wins.
pub fn merge_records(
    existing: &mut BTreeMap<RecordKey, AttendanceRecord>,
    incoming: Vec<AttendanceRecord>,
) -> UpsertSummary {
    let mut seen: HashSet<RecordKey> = HashSet::new();
    let mut summary = UpsertSummary::default();
    for rec in incoming {
        let key = rec.key();
        let fresh = seen.insert(key.clone());
        if fresh {
            summary.written += 1;
            if existing.contains_key(&key) {
                summary.superseded += 1;
            }
        }
        existing.insert(key, rec);
    }
    summary
}

impl Store {
    /// Unscoped upsert. Records whose school id is empty get it from their
    /// student when the student is known.
    pub fn save_attendance(
        &mut self,
        new_records: Vec<AttendanceRecord>,
    ) -> Result<UpsertSummary, StoreError> {
        let incoming: Vec<AttendanceRecord> = new_records
            .into_iter()
            .map(|mut r| {
                if r.school_id.is_empty() {
                    if let Some(s) = self.student(&r.student_id) {
                        r.school_id = s.school_id.clone();
                    }
                }
                r
            })
            .collect();
        self.upsert(incoming, 0)
    }

    fn upsert(
        &mut self,
        incoming: Vec<AttendanceRecord>,
        rejected: usize,
    ) -> Result<UpsertSummary, StoreError> {
        if incoming.is_empty() {
            return Ok(UpsertSummary {
                rejected,
                ..UpsertSummary::default()
            });
        }
        let mut records = self.staged_records();
        let mut summary = merge_records(&mut records, incoming);
        summary.rejected = rejected;
        self.commit(Staged {
            records: Some(records),
            ..Staged::default()
        })?;
        tracing::info!(
            written = summary.written,
            superseded = summary.superseded,
            rejected = summary.rejected,
            "attendance saved"
        );
        Ok(summary)
    }
}

/// Scoped upsert for a caller. Each record's school id is stamped from its
/// student. A record is dropped when its student, or the record it would
/// replace, belongs to another school.
pub fn submit_attendance(
    store: &mut Store,
    session: &Session,
    new_records: Vec<AttendanceRecord>,
) -> Result<UpsertSummary, ServiceError> {
    session.require(Permission::TakeAttendance, "take attendance")?;

    let Scope::School { school_id } = &session.scope else {
        return Ok(store.save_attendance(new_records)?);
    };

    let mut accepted = Vec::with_capacity(new_records.len());
    let mut rejected = 0usize;
    for mut rec in new_records {
        let owner = store.student(&rec.student_id).map(|s| s.school_id.clone());
        let foreign_student = owner.as_deref().map(|id| id != school_id).unwrap_or(false);
        let foreign_record = store
            .record(&rec.student_id, rec.date)
            .map(|r| &r.school_id != school_id)
            .unwrap_or(false);
        if foreign_student || foreign_record {
            tracing::warn!(
                student_id = %rec.student_id,
                school_id = %school_id,
                "attendance submission outside caller school dropped"
            );
            rejected += 1;
            continue;
        }
        rec.school_id = school_id.clone();
        accepted.push(rec);
    }
    Ok(store.upsert(accepted, rejected)?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow {
    pub student: Student,
    pub status: AttendanceStatus,
    /// False when the status is the entry-form default.
    pub recorded: bool,
    pub note: Option<String>,
}

/// Entry form for one day: each visible student passing `filter` with the
/// saved status, or `present` when nothing is recorded yet.
pub fn attendance_sheet(
    store: &Store,
    session: &Session,
    date: NaiveDate,
    filter: &StudentFilter,
) -> Result<Vec<SheetRow>, AccessError> {
    session.require(Permission::TakeAttendance, "take attendance")?;
    let students = list_students(store, session, filter);
    Ok(students
        .into_iter()
        .map(|student| {
            let rec = store.record(&student.id, date);
            SheetRow {
                status: rec.map(|r| r.status).unwrap_or(AttendanceStatus::Present),
                recorded: rec.is_some(),
                note: rec.and_then(|r| r.note.clone()),
                student,
            }
        })
        .collect())
}

pub fn records_for_date(store: &Store, session: &Session, date: NaiveDate) -> Vec<AttendanceRecord> {
    session
        .records(store)
        .into_iter()
        .filter(|r| r.date == date)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentHistory {
    pub student: Student,
    /// Newest first.
    pub records: Vec<AttendanceRecord>,
    pub rate: AttendanceRate,
    pub badges: Vec<Badge>,
}

pub fn student_history(
    store: &Store,
    session: &Session,
    student_id: &str,
) -> Result<StudentHistory, AccessError> {
    session.require(Permission::ViewReports, "view reports")?;
    let student = session.visible_student(store, student_id)?;
    let mut records: Vec<AttendanceRecord> = store
        .records_for_student(student_id)
        .into_iter()
        .filter(|r| r.school_id == student.school_id)
        .collect();
    records.reverse();
    let rate = compute_rate(&records);
    Ok(StudentHistory {
        student,
        records,
        badges: badges(&rate),
        rate,
    })
}
