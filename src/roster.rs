use crate::access::{Scope, Session};
use crate::error::{AccessError, ServiceError, ValidationError};
use crate::exchange::parse_student_import;
use crate::model::{AttendanceRecord, Permission, School, Student};
use crate::rates::{student_rates, AttendanceRate, Standing};
use crate::store::{Staged, Store};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

fn roster_school(session: &Session) -> Result<&str, AccessError> {
    match &session.scope {
        Scope::School { school_id } => Ok(school_id),
        _ => Err(session.forbidden("manage a school roster")),
    }
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(v.to_string())
}

/// Recounts `studentCount` for the given schools against `students`.
fn refreshed_counts(
    store: &Store,
    students: &BTreeMap<String, Student>,
    school_ids: &[&str],
) -> Option<BTreeMap<String, School>> {
    let mut schools = store.staged_schools();
    let mut changed = false;
    for id in school_ids {
        if let Some(school) = schools.get_mut(*id) {
            let count = students.values().filter(|s| s.school_id == *id).count();
            if school.student_count != count {
                school.student_count = count;
                changed = true;
            }
        }
    }
    changed.then_some(schools)
}

fn commit_roster(
    store: &mut Store,
    students: BTreeMap<String, Student>,
    school_ids: &[&str],
) -> Result<(), ServiceError> {
    let schools = refreshed_counts(store, &students, school_ids);
    store.commit(Staged {
        students: Some(students),
        schools,
        ..Staged::default()
    })?;
    Ok(())
}

pub fn add_student(
    store: &mut Store,
    session: &Session,
    name: &str,
    grade: &str,
) -> Result<Student, ServiceError> {
    session.require(Permission::ManageStudents, "manage students")?;
    let school_id = roster_school(session)?.to_string();
    let student = Student {
        id: Uuid::new_v4().to_string(),
        school_id: school_id.clone(),
        name: required(name, "name")?,
        grade: required(grade, "grade")?,
    };

    let mut students = store.staged_students();
    students.insert(student.id.clone(), student.clone());
    commit_roster(store, students, &[&school_id])?;
    tracing::info!(student_id = %student.id, school_id = %school_id, "student added");
    Ok(student)
}

/// Adds every well-formed line of a bulk import. Returns the number added.
pub fn import_students(store: &mut Store, session: &Session, text: &str) -> Result<usize, ServiceError> {
    session.require(Permission::ManageStudents, "manage students")?;
    let school_id = roster_school(session)?.to_string();
    let parsed = parse_student_import(text);
    if parsed.is_empty() {
        return Ok(0);
    }

    let mut students = store.staged_students();
    for entry in &parsed {
        let id = Uuid::new_v4().to_string();
        students.insert(
            id.clone(),
            Student {
                id,
                school_id: school_id.clone(),
                name: entry.name.clone(),
                grade: entry.grade.clone(),
            },
        );
    }
    commit_roster(store, students, &[&school_id])?;
    tracing::info!(added = parsed.len(), school_id = %school_id, "students imported");
    Ok(parsed.len())
}

pub fn update_student(
    store: &mut Store,
    session: &Session,
    student_id: &str,
    name: &str,
    grade: &str,
) -> Result<Student, ServiceError> {
    session.require(Permission::ManageStudents, "manage students")?;
    let school_id = roster_school(session)?.to_string();
    if !store.is_enrolled(student_id, &school_id) {
        return Err(ValidationError::NotFound {
            entity: "student",
            id: student_id.to_string(),
        }
        .into());
    }
    let updated = Student {
        id: student_id.to_string(),
        school_id,
        name: required(name, "name")?,
        grade: required(grade, "grade")?,
    };
    let mut students = store.staged_students();
    students.insert(updated.id.clone(), updated.clone());
    store.commit(Staged {
        students: Some(students),
        ..Staged::default()
    })?;
    Ok(updated)
}

/// Removes a student from the roster. Attendance history stays in the store
/// but drops out of school-scoped reads.
pub fn delete_student(store: &mut Store, session: &Session, student_id: &str) -> Result<(), ServiceError> {
    session.require(Permission::ManageStudents, "manage students")?;
    let school_id = roster_school(session)?.to_string();
    if !store.is_enrolled(student_id, &school_id) {
        return Err(ValidationError::NotFound {
            entity: "student",
            id: student_id.to_string(),
        }
        .into());
    }
    let mut students = store.staged_students();
    students.remove(student_id);
    commit_roster(store, students, &[&school_id])?;
    tracing::info!(student_id = %student_id, school_id = %school_id, "student deleted");
    Ok(())
}

/// Distinct cohort labels among the visible students, sorted.
pub fn grades(store: &Store, session: &Session) -> Vec<String> {
    session
        .students(store)
        .into_iter()
        .map(|s| s.grade)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Narrowing shared by the student list and the entry sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub grade: Option<String>,
    /// Substring of the name or the grade. Case-sensitive.
    pub search: Option<String>,
    pub standing: Option<Standing>,
}

impl StudentFilter {
    pub fn grade(grade: &str) -> Self {
        Self {
            grade: Some(grade.to_string()),
            ..Self::default()
        }
    }

    pub fn search(term: &str) -> Self {
        Self {
            search: Some(term.to_string()),
            ..Self::default()
        }
    }

    pub fn standing(standing: Standing) -> Self {
        Self {
            standing: Some(standing),
            ..Self::default()
        }
    }
}

/// Keeps the students that pass every set criterion. Standing is judged on
/// each student's rate over `records`; students with none count as 100.
pub fn filter_students(
    students: Vec<Student>,
    records: &[AttendanceRecord],
    filter: &StudentFilter,
    threshold: u32,
) -> Vec<Student> {
    let term = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let rates: HashMap<String, AttendanceRate> = match filter.standing {
        Some(_) => student_rates(&students, records)
            .into_iter()
            .map(|sr| (sr.student_id, sr.rate))
            .collect(),
        None => HashMap::new(),
    };
    students
        .into_iter()
        .filter(|s| filter.grade.as_deref().map(|g| s.grade == g).unwrap_or(true))
        .filter(|s| term.map(|t| s.name.contains(t) || s.grade.contains(t)).unwrap_or(true))
        .filter(|s| match (filter.standing, rates.get(&s.id)) {
            (Some(standing), Some(rate)) => standing.matches(rate, threshold),
            _ => true,
        })
        .collect()
}

/// Visible students passing `filter`, ordered by name.
pub fn list_students(store: &Store, session: &Session, filter: &StudentFilter) -> Vec<Student> {
    let records = match filter.standing {
        Some(_) => session.records(store),
        None => Vec::new(),
    };
    let threshold = store.settings().attendance_threshold;
    let mut students = filter_students(session.students(store), &records, filter, threshold);
    students.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    students
}
