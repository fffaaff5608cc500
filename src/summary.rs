//! Narrative summaries over attendance figures.
//!
//! The text generator sits behind [`Summarizer`]; nothing else in the crate
//! reads its output, so a failing or missing generator only changes the text.

use crate::model::{AttendanceRecord, Student};
use crate::rates::{compute_rate, is_at_risk, student_rates, AttendanceRate, StudentRate};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryInput {
    pub school_name: Option<String>,
    pub attendance_threshold: u32,
    pub overall: AttendanceRate,
    pub students: Vec<StudentRate>,
}

impl SummaryInput {
    pub fn build(
        students: &[Student],
        records: &[AttendanceRecord],
        attendance_threshold: u32,
        school_name: Option<String>,
    ) -> Self {
        Self {
            school_name,
            attendance_threshold,
            overall: compute_rate(records),
            students: student_rates(students, records),
        }
    }

    pub fn at_risk_count(&self) -> usize {
        self.students
            .iter()
            .filter(|s| is_at_risk(&s.rate, self.attendance_threshold))
            .count()
    }
}

pub trait Summarizer {
    fn summarize(&self, input: &SummaryInput) -> anyhow::Result<String>;
}

/// Plain figures, no generator involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct FigureSummarizer;

impl Summarizer for FigureSummarizer {
    fn summarize(&self, input: &SummaryInput) -> anyhow::Result<String> {
        Ok(fallback_summary(input))
    }
}

pub fn fallback_summary(input: &SummaryInput) -> String {
    let subject = input.school_name.as_deref().unwrap_or("the school");
    format!(
        "{} students at {}: overall attendance {}% over {} records; {} below the {}% threshold.",
        input.students.len(),
        subject,
        input.overall.rate,
        input.overall.total,
        input.at_risk_count(),
        input.attendance_threshold
    )
}

pub fn summarize_or_fallback(summarizer: &dyn Summarizer, input: &SummaryInput) -> String {
    match summarizer.summarize(input) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => fallback_summary(input),
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "summarizer failed, using fallback text");
            fallback_summary(input)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttendanceRecord, AttendanceStatus, Student};
    use chrono::NaiveDate;

    struct Broken;

    impl Summarizer for Broken {
        fn summarize(&self, _input: &SummaryInput) -> anyhow::Result<String> {
            anyhow::bail!("generator offline")
        }
    }

    fn input() -> SummaryInput {
        let students = vec![
            Student {
                id: "s1".into(),
                school_id: "a".into(),
                name: "Huda".into(),
                grade: "7".into(),
            },
            Student {
                id: "s2".into(),
                school_id: "a".into(),
                name: "Omar".into(),
                grade: "7".into(),
            },
        ];
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let records = vec![
            AttendanceRecord::new("s1", "a", d, AttendanceStatus::Present, None),
            AttendanceRecord::new("s2", "a", d, AttendanceStatus::Absent, None),
        ];
        SummaryInput::build(&students, &records, 75, Some("Al Noor".into()))
    }

    #[test]
    fn failing_summarizer_falls_back_to_figures() {
        let input = input();
        let text = summarize_or_fallback(&Broken, &input);
        assert_eq!(text, fallback_summary(&input));
        assert!(text.contains("Al Noor"));
        assert!(text.contains("50%"));
        assert!(text.contains("1 below the 75% threshold"));
    }
}
