use attendanced::access::{Scope, Session};
use attendanced::attendance::submit_attendance;
use attendanced::model::{AttendanceRecord, AttendanceStatus, Role, School, Student, User};
use attendanced::store::{index_by_id, Staged, Store};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
}

fn school(id: &str) -> School {
    School {
        id: id.to_string(),
        name: format!("School {}", id),
        is_active: true,
        subscription_end_date: NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid date"),
        student_count: 1,
        principal_id: String::new(),
    }
}

fn student(id: &str, school_id: &str) -> Student {
    Student {
        id: id.to_string(),
        school_id: school_id.to_string(),
        name: format!("Student {}", id),
        grade: "7".to_string(),
    }
}

fn teacher_session(school_id: &str) -> Session {
    Session::new(
        User {
            id: format!("t-{}", school_id),
            username: format!("teacher-{}", school_id),
            name: "Teacher".to_string(),
            role: Role::Teacher,
            school_id: Some(school_id.to_string()),
            related_student_id: None,
        },
        Scope::School {
            school_id: school_id.to_string(),
        },
    )
}

fn seeded_store() -> Store {
    let mut store = Store::in_memory();
    store
        .commit(Staged {
            schools: Some(index_by_id(vec![school("a"), school("b")], |s| s.id.as_str())),
            students: Some(index_by_id(
                vec![student("s1", "a"), student("s2", "a"), student("s9", "b")],
                |s| s.id.as_str(),
            )),
            ..Staged::default()
        })
        .expect("seed store");
    store
}

fn rec(student_id: &str, date: NaiveDate, status: AttendanceStatus, note: Option<&str>) -> AttendanceRecord {
    AttendanceRecord::new(student_id, "", date, status, note.map(|n| n.to_string()))
}

#[test]
fn saving_the_same_batch_twice_keeps_one_record_per_key() {
    let mut store = seeded_store();
    let batch = vec![
        rec("s1", day(1), AttendanceStatus::Present, None),
        rec("s2", day(1), AttendanceStatus::Late, None),
    ];

    let first = store.save_attendance(batch.clone()).expect("first save");
    assert_eq!(first.written, 2);
    assert_eq!(first.superseded, 0);
    let after_first = store.records(None);

    let second = store.save_attendance(batch).expect("second save");
    assert_eq!(second.superseded, 2);
    assert_eq!(store.record_count(), 2);
    assert_eq!(store.records(None), after_first);
}

#[test]
fn a_new_submission_replaces_the_old_record_wholly() {
    let mut store = seeded_store();
    store
        .save_attendance(vec![rec("s1", day(1), AttendanceStatus::Absent, Some("x"))])
        .expect("save absent");
    store
        .save_attendance(vec![rec("s1", day(1), AttendanceStatus::Present, None)])
        .expect("save present");

    let r = store.record("s1", day(1)).expect("record exists");
    assert_eq!(r.status, AttendanceStatus::Present);
    assert_eq!(r.note, None);
    assert_eq!(store.record_count(), 1);
}

#[test]
fn records_for_other_pairs_are_retained() {
    let mut store = seeded_store();
    store
        .save_attendance(vec![
            rec("s1", day(1), AttendanceStatus::Absent, None),
            rec("s1", day(2), AttendanceStatus::Absent, None),
        ])
        .expect("seed records");
    store
        .save_attendance(vec![rec("s1", day(2), AttendanceStatus::Excused, Some("sick"))])
        .expect("update day 2");

    assert_eq!(store.record("s1", day(1)).map(|r| r.status), Some(AttendanceStatus::Absent));
    assert_eq!(store.record("s1", day(2)).map(|r| r.status), Some(AttendanceStatus::Excused));
}

#[test]
fn duplicate_keys_in_one_batch_keep_the_last_submission() {
    let mut store = seeded_store();
    let summary = store
        .save_attendance(vec![
            rec("s1", day(3), AttendanceStatus::Absent, None),
            rec("s1", day(3), AttendanceStatus::Late, Some("bus")),
        ])
        .expect("save");
    assert_eq!(summary.written, 1);
    let r = store.record("s1", day(3)).expect("record");
    assert_eq!(r.status, AttendanceStatus::Late);
    assert_eq!(r.note.as_deref(), Some("bus"));
}

#[test]
fn school_id_is_stamped_from_the_student() {
    let mut store = seeded_store();
    store
        .save_attendance(vec![rec("s9", day(1), AttendanceStatus::Present, None)])
        .expect("save");
    assert_eq!(store.record("s9", day(1)).map(|r| r.school_id.as_str()), Some("b"));
}

#[test]
fn scoped_submission_drops_students_of_other_schools() {
    let mut store = seeded_store();
    let session = teacher_session("a");
    let summary = submit_attendance(
        &mut store,
        &session,
        vec![
            rec("s1", day(4), AttendanceStatus::Present, None),
            rec("s9", day(4), AttendanceStatus::Absent, None),
        ],
    )
    .expect("submit");

    assert_eq!(summary.written, 1);
    assert_eq!(summary.rejected, 1);
    assert!(store.record("s9", day(4)).is_none());
    assert_eq!(store.record("s1", day(4)).map(|r| r.school_id.as_str()), Some("a"));
}

#[test]
fn roles_without_take_attendance_cannot_submit() {
    let mut store = seeded_store();
    let mut session = teacher_session("a");
    session.user.role = Role::Parent;
    let err = submit_attendance(
        &mut store,
        &session,
        vec![rec("s1", day(5), AttendanceStatus::Present, None)],
    )
    .expect_err("parent must be refused");
    assert_eq!(err.code(), "forbidden");
    assert_eq!(store.record_count(), 0);
}
