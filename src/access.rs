//! Caller identity and tenant scoping.
//!
//! Every service call takes an explicit [`Session`]; there is no ambient
//! "current user".

use crate::error::{AccessError, AuthError};
use crate::model::{AttendanceRecord, Permission, Role, Student, User};
use crate::store::Store;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Scope {
    /// System administrators: no school scoping.
    Global,
    School { school_id: String },
    /// Parent and student accounts: one student's own records.
    Student {
        school_id: String,
        student_id: String,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub scope: Scope,
}

impl Session {
    pub fn new(user: User, scope: Scope) -> Self {
        Self { user, scope }
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn school_id(&self) -> Option<&str> {
        match &self.scope {
            Scope::Global => None,
            Scope::School { school_id } | Scope::Student { school_id, .. } => Some(school_id),
        }
    }

    pub fn require(&self, permission: Permission, action: &'static str) -> Result<(), AccessError> {
        if self.role().allows(permission) {
            Ok(())
        } else {
            Err(self.forbidden(action))
        }
    }

    pub fn require_system_administrator(&self, action: &'static str) -> Result<(), AccessError> {
        if self.role().is_system_administrator() {
            Ok(())
        } else {
            Err(self.forbidden(action))
        }
    }

    pub fn forbidden(&self, action: &'static str) -> AccessError {
        AccessError::Forbidden {
            role: self.role().as_str().to_string(),
            action,
        }
    }

    pub fn students(&self, store: &Store) -> Vec<Student> {
        match &self.scope {
            Scope::Global => store.students(None),
            Scope::School { school_id } => store.students(Some(school_id.as_str())),
            Scope::Student {
                school_id,
                student_id,
            } => store
                .student(student_id)
                .filter(|s| &s.school_id == school_id)
                .cloned()
                .into_iter()
                .collect(),
        }
    }

    pub fn records(&self, store: &Store) -> Vec<AttendanceRecord> {
        match &self.scope {
            Scope::Global => store.records(None),
            Scope::School { school_id } => store.records(Some(school_id.as_str())),
            Scope::Student {
                school_id,
                student_id,
            } => {
                if !store.is_enrolled(student_id, school_id) {
                    return Vec::new();
                }
                store
                    .records_for_student(student_id)
                    .into_iter()
                    .filter(|r| &r.school_id == school_id)
                    .collect()
            }
        }
    }

    pub fn can_see_student(&self, store: &Store, student_id: &str) -> bool {
        match &self.scope {
            Scope::Global => store.student(student_id).is_some(),
            Scope::School { school_id } => store.is_enrolled(student_id, school_id),
            Scope::Student {
                school_id,
                student_id: own,
            } => own == student_id && store.is_enrolled(student_id, school_id),
        }
    }

    pub fn visible_student(&self, store: &Store, student_id: &str) -> Result<Student, AccessError> {
        if !self.can_see_student(store, student_id) {
            return Err(AccessError::OutOfScope {
                entity: "student",
                id: student_id.to_string(),
            });
        }
        store
            .student(student_id)
            .cloned()
            .ok_or_else(|| AccessError::OutOfScope {
                entity: "student",
                id: student_id.to_string(),
            })
    }
}

/// Resolves a username to a session. Non-administrators must belong to an
/// existing school whose subscription is active.
pub fn authenticate(store: &Store, username: &str) -> Result<Session, AuthError> {
    let user = store
        .user_by_username(username)
        .cloned()
        .ok_or(AuthError::UnknownUser)?;

    if user.role.is_system_administrator() {
        tracing::info!(user_id = %user.id, "system administrator logged in");
        return Ok(Session::new(user, Scope::Global));
    }

    let school_id = user.school_id.clone().ok_or(AuthError::NoSchool)?;
    let school = store.school(&school_id).ok_or(AuthError::NoSchool)?;
    if !school.is_active {
        tracing::info!(user_id = %user.id, school_id = %school_id, "login refused: subscription inactive");
        return Err(AuthError::SubscriptionInactive);
    }

    let scope = if user.role.is_student_bound() {
        let student_id = user
            .related_student_id
            .clone()
            .ok_or(AuthError::NoRelatedStudent)?;
        Scope::Student {
            school_id,
            student_id,
        }
    } else {
        Scope::School { school_id }
    };

    tracing::info!(user_id = %user.id, role = ?user.role, "user logged in");
    Ok(Session::new(user, scope))
}
