use crate::model::{AttendanceRecord, Student, DATE_FORMAT};
use crate::rates::MonthlyGrid;
use anyhow::Context;
use chrono::Datelike;
use std::collections::HashMap;

/// Prepended so spreadsheet tools pick UTF-8 for the Arabic headers.
pub const UTF8_BOM: &str = "\u{FEFF}";

pub const ATTENDANCE_CSV_HEADER: [&str; 5] = ["الاسم", "الصف", "التاريخ", "الحالة", "ملاحظات"];
const DELETED_STUDENT_NAME: &str = "طالب محذوف";
const DELETED_STUDENT_GRADE: &str = "-";
const NO_RECORD_CELL: &str = "-";

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> anyhow::Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush csv: {}", e.error()))?;
    let body = String::from_utf8(bytes).context("csv output is not UTF-8")?;
    Ok(format!("{}{}", UTF8_BOM, body))
}

/// One row per record, in the order given.
pub fn export_attendance_csv(students: &[Student], records: &[AttendanceRecord]) -> anyhow::Result<String> {
    let by_id: HashMap<&str, &Student> = students.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut w = csv_writer();
    w.write_record(ATTENDANCE_CSV_HEADER)
        .context("failed to write csv header")?;
    for r in records {
        let student = by_id.get(r.student_id.as_str());
        let date = r.date.format(DATE_FORMAT).to_string();
        w.write_record([
            student.map(|s| s.name.as_str()).unwrap_or(DELETED_STUDENT_NAME),
            student.map(|s| s.grade.as_str()).unwrap_or(DELETED_STUDENT_GRADE),
            date.as_str(),
            r.status.label(),
            r.note.as_deref().unwrap_or(""),
        ])
        .context("failed to write csv row")?;
    }
    finish(w)
}

/// Printable month grid: one column per day, then the tallies.
pub fn export_monthly_csv(grid: &MonthlyGrid) -> anyhow::Result<String> {
    let mut w = csv_writer();
    let mut header: Vec<String> = vec!["اسم الطالب".to_string(), "الصف".to_string()];
    header.extend(grid.days.iter().map(|d| format!("{}/{}", d.day(), d.month())));
    header.extend(["حضور", "تأخير", "غياب", "عذر"].iter().map(|s| s.to_string()));
    w.write_record(&header).context("failed to write csv header")?;

    for row in &grid.rows {
        let mut fields: Vec<String> = vec![row.name.clone(), row.grade.clone()];
        fields.extend(row.cells.iter().map(|c| {
            c.map(|s| s.label().to_string())
                .unwrap_or_else(|| NO_RECORD_CELL.to_string())
        }));
        fields.push(row.present.to_string());
        fields.push(row.late.to_string());
        fields.push(row.absent.to_string());
        fields.push(row.excused.to_string());
        w.write_record(&fields).context("failed to write csv row")?;
    }
    finish(w)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedStudent {
    pub name: String,
    pub grade: String,
}

/// One student per line, fields split on `,` or `-`. The first two non-empty
/// trimmed fields are name and grade; anything else on the line is ignored.
/// Lines without two such fields are skipped.
pub fn parse_student_import(text: &str) -> Vec<ImportedStudent> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line
                .split([',', '-'])
                .map(str::trim)
                .filter(|f| !f.is_empty());
            let name = fields.next()?;
            let grade = fields.next()?;
            Some(ImportedStudent {
                name: name.to_string(),
                grade: grade.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_accepts_comma_and_hyphen() {
        let parsed = parse_student_import("أحمد محمد, العاشر\nسارة علي - الحادي عشر\n\n  \nonlyname\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "أحمد محمد");
        assert_eq!(parsed[0].grade, "العاشر");
        assert_eq!(parsed[1].grade, "الحادي عشر");
    }

    #[test]
    fn import_skips_lines_with_one_field() {
        let parsed = parse_student_import("lonely\n,  ,x\n - , - \na,b,c");
        assert_eq!(
            parsed,
            vec![ImportedStudent {
                name: "a".to_string(),
                grade: "b".to_string()
            }]
        );
    }

    #[test]
    fn import_takes_first_two_non_empty_fields() {
        let parsed = parse_student_import(", Omar ,, 10 , extra");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "Omar");
        assert_eq!(parsed[0].grade, "10");
    }
}
