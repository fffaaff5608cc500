use attendanced::access::{Scope, Session};
use attendanced::exchange::{export_attendance_csv, export_monthly_csv, UTF8_BOM};
use attendanced::model::{AttendanceRecord, AttendanceStatus, Role, Student, User};
use attendanced::rates::monthly_grid;
use attendanced::reports::attendance_csv;
use attendanced::store::{index_by_id, Staged, Store};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, d).expect("valid date")
}

fn student(id: &str, name: &str, grade: &str) -> Student {
    Student {
        id: id.to_string(),
        school_id: "a".to_string(),
        name: name.to_string(),
        grade: grade.to_string(),
    }
}

fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let body = text.strip_prefix(UTF8_BOM).expect("starts with BOM");
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(body.as_bytes())
        .records()
        .map(|r| r.expect("valid csv row").iter().map(|f| f.to_string()).collect())
        .collect()
}

#[test]
fn header_and_localized_statuses() {
    let students = vec![student("s1", "Lina", "4")];
    let records = vec![
        AttendanceRecord::new("s1", "a", day(1), AttendanceStatus::Present, None),
        AttendanceRecord::new("s1", "a", day(2), AttendanceStatus::Excused, Some("clinic".into())),
    ];
    let out = export_attendance_csv(&students, &records).expect("export");
    assert!(out.starts_with("\u{FEFF}الاسم,الصف,التاريخ,الحالة,ملاحظات"));

    let rows = parse_rows(&out);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec!["Lina", "4", "2024-02-01", "حاضر", ""]);
    assert_eq!(rows[2], vec!["Lina", "4", "2024-02-02", "بعذر", "clinic"]);
}

#[test]
fn names_with_commas_are_quoted_without_shifting_columns() {
    let students = vec![student("s1", "Haddad, Rami", "10")];
    let records = vec![AttendanceRecord::new(
        "s1",
        "a",
        day(3),
        AttendanceStatus::Late,
        Some("bus, again".into()),
    )];
    let out = export_attendance_csv(&students, &records).expect("export");
    assert!(out.contains("\"Haddad, Rami\""));

    let rows = parse_rows(&out);
    assert!(rows.iter().all(|r| r.len() == 5));
    assert_eq!(rows[1][0], "Haddad, Rami");
    assert_eq!(rows[1][3], "متأخر");
    assert_eq!(rows[1][4], "bus, again");
}

#[test]
fn records_of_removed_students_use_a_placeholder() {
    let out = export_attendance_csv(
        &[],
        &[AttendanceRecord::new("gone", "a", day(4), AttendanceStatus::Absent, None)],
    )
    .expect("export");
    let rows = parse_rows(&out);
    assert_eq!(rows[1][0], "طالب محذوف");
    assert_eq!(rows[1][1], "-");
    assert_eq!(rows[1][3], "غائب");
}

#[test]
fn monthly_csv_has_a_column_per_day_and_tallies() {
    let students = vec![student("s1", "Omar", "3")];
    let records = vec![
        AttendanceRecord::new("s1", "a", day(1), AttendanceStatus::Present, None),
        AttendanceRecord::new("s1", "a", day(2), AttendanceStatus::Excused, None),
    ];
    let grid = monthly_grid(&students, &records, 2024, 2);
    let rows = parse_rows(&export_monthly_csv(&grid).expect("export"));

    // name, grade, 29 days, 4 tallies
    assert_eq!(rows[0].len(), 2 + 29 + 4);
    assert_eq!(rows[0][0], "اسم الطالب");
    assert_eq!(rows[0][2], "1/2");
    assert_eq!(rows[0][30], "29/2");
    assert_eq!(&rows[0][31..], &["حضور", "تأخير", "غياب", "عذر"]);

    assert_eq!(rows[1][2], "حاضر");
    assert_eq!(rows[1][3], "بعذر");
    assert_eq!(rows[1][4], "-");
    assert_eq!(&rows[1][31..], &["1", "0", "0", "1"]);
}

fn principal(scope: Scope) -> Session {
    Session::new(
        User {
            id: "u-head".into(),
            username: "head".into(),
            name: "Head".into(),
            role: Role::Principal,
            school_id: Some("a".into()),
            related_student_id: None,
        },
        scope,
    )
}

#[test]
fn unscoped_report_sessions_export_removed_students_under_the_placeholder() {
    let mut store = Store::in_memory();
    store
        .commit(Staged {
            students: Some(index_by_id(vec![student("s1", "Lina", "4")], |s| s.id.as_str())),
            ..Staged::default()
        })
        .expect("seed students");
    store
        .save_attendance(vec![
            AttendanceRecord::new("s1", "", day(1), AttendanceStatus::Present, None),
            AttendanceRecord::new("gone", "a", day(2), AttendanceStatus::Absent, None),
        ])
        .expect("seed records");

    let global = attendance_csv(&store, &principal(Scope::Global)).expect("export");
    let rows = parse_rows(&global);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], vec!["طالب محذوف", "-", "2024-02-02", "غائب", ""]);
    assert_eq!(rows[2][0], "Lina");

    let scoped = attendance_csv(
        &store,
        &principal(Scope::School {
            school_id: "a".into(),
        }),
    )
    .expect("export");
    assert_eq!(parse_rows(&scoped).len(), 2);
}
