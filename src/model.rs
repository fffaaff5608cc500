use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ATTENDANCE_THRESHOLD: u32 = 75;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub subscription_end_date: NaiveDate,
    #[serde(default)]
    pub student_count: usize,
    #[serde(default)]
    pub principal_id: String,
}

/// Closed role set. What each role may do lives in [`Role::allows`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    SystemAdministrator,
    Principal,
    VicePrincipal,
    Teacher,
    Staff,
    Parent,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewDashboard,
    TakeAttendance,
    ViewReports,
    ManageStudents,
    ManageSettings,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::SystemAdministrator => "system-administrator",
            Role::Principal => "principal",
            Role::VicePrincipal => "vice-principal",
            Role::Teacher => "teacher",
            Role::Staff => "staff",
            Role::Parent => "parent",
            Role::Student => "student",
        }
    }

    pub fn allows(self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::SystemAdministrator => matches!(permission, ManageSettings),
            Role::Principal => true,
            Role::VicePrincipal => !matches!(permission, ManageSettings),
            Role::Teacher => matches!(permission, ViewDashboard | TakeAttendance | ViewReports),
            Role::Staff => matches!(permission, ViewDashboard | TakeAttendance),
            Role::Parent | Role::Student => matches!(permission, ViewReports),
        }
    }

    pub fn is_system_administrator(self) -> bool {
        self == Role::SystemAdministrator
    }

    /// Parent and student accounts only ever see their related student.
    pub fn is_student_bound(self) -> bool {
        matches!(self, Role::Parent | Role::Student)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_student_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub school_id: String,
    pub name: String,
    pub grade: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    /// Fixed localized token used by every export.
    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "حاضر",
            AttendanceStatus::Absent => "غائب",
            AttendanceStatus::Late => "متأخر",
            AttendanceStatus::Excused => "بعذر",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            "excused" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

/// Natural key of an attendance record. Uniqueness is enforced on this pair,
/// never on `AttendanceRecord::id`.
pub type RecordKey = (String, NaiveDate);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    #[serde(default)]
    pub school_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl AttendanceRecord {
    pub fn new(
        student_id: &str,
        school_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        note: Option<String>,
    ) -> Self {
        Self {
            id: record_id(date, student_id),
            student_id: student_id.to_string(),
            school_id: school_id.to_string(),
            date,
            status,
            note,
        }
    }

    pub fn key(&self) -> RecordKey {
        (self.student_id.clone(), self.date)
    }
}

pub fn record_id(date: NaiveDate, student_id: &str) -> String {
    format!("{}-{}", date.format(DATE_FORMAT), student_id)
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Strict `YYYY-MM-DD` with a four-digit year; signed or expanded years are
/// refused.
pub fn parse_date_key(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let b = s.as_bytes();
    let shaped = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b
            .iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !shaped {
        return None;
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

/// Local wall-clock calendar day.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub attendance_threshold: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            attendance_threshold: DEFAULT_ATTENDANCE_THRESHOLD,
        }
    }
}
