use attendanced::access::{authenticate, Scope};
use attendanced::attendance::{attendance_sheet, student_history};
use attendanced::error::AuthError;
use attendanced::model::{AttendanceRecord, AttendanceStatus, Role, School, Student, User};
use attendanced::roster::{delete_student, list_students, StudentFilter};
use attendanced::store::{index_by_id, Staged, Store};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, d).expect("valid date")
}

fn school(id: &str, active: bool) -> School {
    School {
        id: id.to_string(),
        name: format!("School {}", id),
        is_active: active,
        subscription_end_date: NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid date"),
        student_count: 0,
        principal_id: String::new(),
    }
}

fn student(id: &str, school_id: &str, name: &str) -> Student {
    Student {
        id: id.to_string(),
        school_id: school_id.to_string(),
        name: name.to_string(),
        grade: "8".to_string(),
    }
}

fn user(username: &str, role: Role, school_id: Option<&str>, related: Option<&str>) -> User {
    User {
        id: format!("u-{}", username),
        username: username.to_string(),
        name: username.to_string(),
        role,
        school_id: school_id.map(|s| s.to_string()),
        related_student_id: related.map(|s| s.to_string()),
    }
}

fn seeded_store() -> Store {
    let mut store = Store::in_memory();
    // Interleave schools so ordering cannot hide a leak.
    let students = vec![
        student("b1", "b", "Zaid"),
        student("a1", "a", "Amal"),
        student("b2", "b", "Badr"),
        student("a2", "a", "Yusuf"),
    ];
    let users = vec![
        user("root", Role::SystemAdministrator, None, None),
        user("Principal.A", Role::Principal, Some("a"), None),
        user("teacher-b", Role::Teacher, Some("b"), None),
        user("parent-a1", Role::Parent, Some("a"), Some("a1")),
        user("closed", Role::Teacher, Some("c"), None),
    ];
    store
        .commit(Staged {
            schools: Some(index_by_id(
                vec![school("a", true), school("b", true), school("c", false)],
                |s| s.id.as_str(),
            )),
            students: Some(index_by_id(students, |s| s.id.as_str())),
            users: Some(index_by_id(users, |u| u.id.as_str())),
            ..Staged::default()
        })
        .expect("seed store");
    store
        .save_attendance(vec![
            AttendanceRecord::new("a1", "", day(1), AttendanceStatus::Present, None),
            AttendanceRecord::new("a2", "", day(1), AttendanceStatus::Absent, None),
            AttendanceRecord::new("b1", "", day(1), AttendanceStatus::Late, None),
        ])
        .expect("seed records");
    store
}

#[test]
fn school_reads_never_return_another_schools_students() {
    let store = seeded_store();
    for s in store.students(Some("a")) {
        assert_eq!(s.school_id, "a");
    }
    assert_eq!(store.students(Some("a")).len(), 2);
    assert_eq!(store.students(Some("b")).len(), 2);
    assert!(store.records(Some("a")).iter().all(|r| r.school_id == "a"));
    assert_eq!(store.records(Some("b")).len(), 1);
}

#[test]
fn login_is_case_insensitive_and_scopes_to_the_school() {
    let store = seeded_store();
    let session = authenticate(&store, "PRINCIPAL.a").expect("login");
    assert_eq!(
        session.scope,
        Scope::School {
            school_id: "a".to_string()
        }
    );
    let names: Vec<String> = list_students(&store, &session, &StudentFilter::default())
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["Amal".to_string(), "Yusuf".to_string()]);
}

#[test]
fn username_match_is_exact_apart_from_case() {
    let store = seeded_store();
    assert_eq!(
        authenticate(&store, " Principal.A ").err(),
        Some(AuthError::UnknownUser)
    );
    assert_eq!(authenticate(&store, "principal").err(), Some(AuthError::UnknownUser));
    assert!(authenticate(&store, "principal.A").is_ok());
}

#[test]
fn inactive_subscription_is_distinct_from_unknown_user() {
    let store = seeded_store();
    assert_eq!(
        authenticate(&store, "closed").err(),
        Some(AuthError::SubscriptionInactive)
    );
    assert_eq!(authenticate(&store, "nobody").err(), Some(AuthError::UnknownUser));
}

#[test]
fn system_administrator_is_unscoped() {
    let store = seeded_store();
    let session = authenticate(&store, "ROOT").expect("login");
    assert_eq!(session.scope, Scope::Global);
    assert_eq!(session.students(&store).len(), 4);
}

#[test]
fn parent_sees_only_the_related_student() {
    let store = seeded_store();
    let session = authenticate(&store, "parent-a1").expect("login");
    let visible = session.students(&store);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, "a1");
    assert!(session.records(&store).iter().all(|r| r.student_id == "a1"));

    let history = student_history(&store, &session, "a1").expect("own history");
    assert_eq!(history.records.len(), 1);
    assert!(student_history(&store, &session, "a2").is_err());
    assert!(attendance_sheet(&store, &session, day(1), &StudentFilter::default()).is_err());
}

#[test]
fn teacher_cannot_read_history_of_another_school() {
    let store = seeded_store();
    let session = authenticate(&store, "teacher-b").expect("login");
    assert!(student_history(&store, &session, "a1").is_err());
    assert!(student_history(&store, &session, "b1").is_ok());
}

#[test]
fn deleted_students_records_leave_school_reads_but_stay_stored() {
    let mut store = seeded_store();
    let session = authenticate(&store, "principal.a").expect("login");
    delete_student(&mut store, &session, "a2").expect("delete");

    assert_eq!(store.record_count(), 3);
    assert!(store.records(Some("a")).iter().all(|r| r.student_id != "a2"));
    assert!(store.record("a2", day(1)).is_some());
}

#[test]
fn sheet_defaults_unrecorded_students_to_present() {
    let store = seeded_store();
    let session = authenticate(&store, "principal.a").expect("login");
    let rows = attendance_sheet(&store, &session, day(2), &StudentFilter::default()).expect("sheet");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.status == AttendanceStatus::Present && !r.recorded));

    let rows = attendance_sheet(&store, &session, day(1), &StudentFilter::default()).expect("sheet");
    let yusuf = rows.iter().find(|r| r.student.id == "a2").expect("row");
    assert_eq!(yusuf.status, AttendanceStatus::Absent);
    assert!(yusuf.recorded);
}
