use attendanced::db::{db_path, settings_get_json, SqliteBackend};
use attendanced::model::{AppSettings, AttendanceRecord, AttendanceStatus, Student};
use attendanced::store::{index_by_id, Staged, Store};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).expect("valid date")
}

#[test]
fn collections_survive_reopening_the_workspace() {
    let dir = tempfile::tempdir().expect("temp dir");
    {
        let mut store = Store::open(SqliteBackend::open(dir.path()).expect("open backend")).expect("open store");
        store
            .commit(Staged {
                students: Some(index_by_id(
                    vec![Student {
                        id: "s1".into(),
                        school_id: "a".into(),
                        name: "Rana".into(),
                        grade: "2".into(),
                    }],
                    |s| s.id.as_str(),
                )),
                settings: Some(AppSettings {
                    attendance_threshold: 70,
                }),
                ..Staged::default()
            })
            .expect("commit");
        store
            .save_attendance(vec![
                AttendanceRecord::new("s1", "", day(1), AttendanceStatus::Late, None),
                AttendanceRecord::new("s1", "", day(1), AttendanceStatus::Absent, Some("final".into())),
            ])
            .expect("save");
    }
    assert!(db_path(dir.path()).is_file());

    let store = Store::open(SqliteBackend::open(dir.path()).expect("reopen backend")).expect("reopen store");
    assert_eq!(store.settings().attendance_threshold, 70);
    assert_eq!(store.students(Some("a")).len(), 1);
    assert_eq!(store.record_count(), 1);
    let r = store.record("s1", day(1)).expect("record");
    assert_eq!(r.status, AttendanceStatus::Absent);
    assert_eq!(r.school_id, "a");
    assert_eq!(r.id, "2024-04-01-s1");
}

#[test]
fn legacy_records_get_school_ids_on_open() {
    let dir = tempfile::tempdir().expect("temp dir");
    {
        let conn = rusqlite::Connection::open(db_path(dir.path())).expect("raw open");
        conn.execute(
            "CREATE TABLE collections(name TEXT PRIMARY KEY, payload TEXT NOT NULL, updated_at TEXT)",
            [],
        )
        .expect("create");
        conn.execute(
            "INSERT INTO collections(name, payload) VALUES('students', ?), ('records', ?)",
            (
                r#"[{"id":"s1","schoolId":"a","name":"Old","grade":"1"}]"#,
                r#"[{"id":"2023-09-01-s1","studentId":"s1","date":"2023-09-01","status":"present"}]"#,
            ),
        )
        .expect("insert");
    }

    let backend = SqliteBackend::open(dir.path()).expect("open");
    let version = settings_get_json(backend.connection(), "schema.version").expect("meta");
    assert!(version.and_then(|v| v.as_i64()).unwrap_or(0) >= 2);

    let store = Store::open(backend).expect("store");
    assert_eq!(store.records(Some("a")).len(), 1);
}

#[test]
fn clearing_empties_the_database() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = Store::open(SqliteBackend::open(dir.path()).expect("open")).expect("store");
    store
        .save_attendance(vec![AttendanceRecord::new("s1", "a", day(2), AttendanceStatus::Present, None)])
        .expect("save");
    store.clear_all().expect("clear");
    drop(store);

    let store = Store::open(SqliteBackend::open(dir.path()).expect("reopen")).expect("store");
    assert_eq!(store.record_count(), 0);
}
