use crate::access::Session;
use crate::error::{ServiceError, ValidationError};
use crate::model::{today, AppSettings, Permission, Role, School, User};
use crate::store::{Staged, Store};
use chrono::Months;
use serde::Serialize;
use uuid::Uuid;

pub const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";

/// Seeds a system administrator into a workspace that has no users at all.
/// Returns true when a user was created.
pub fn bootstrap_admin(store: &mut Store) -> Result<bool, ServiceError> {
    if store.users().next().is_some() {
        return Ok(false);
    }
    let admin = User {
        id: Uuid::new_v4().to_string(),
        username: BOOTSTRAP_ADMIN_USERNAME.to_string(),
        name: "System Administrator".to_string(),
        role: Role::SystemAdministrator,
        school_id: None,
        related_student_id: None,
    };
    let mut users = store.staged_users();
    users.insert(admin.id.clone(), admin);
    store.commit(Staged {
        users: Some(users),
        ..Staged::default()
    })?;
    tracing::info!(username = BOOTSTRAP_ADMIN_USERNAME, "bootstrap administrator created");
    Ok(true)
}

#[derive(Debug, Clone, Default)]
pub struct SchoolDraft {
    pub id: Option<String>,
    pub name: String,
    pub principal_id: Option<String>,
}

/// Inserts a school or renames an existing one. New schools start active with
/// a subscription ending one year from today.
pub fn save_school(store: &mut Store, session: &Session, draft: SchoolDraft) -> Result<School, ServiceError> {
    session.require_system_administrator("manage schools")?;
    let name = draft.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError::Required("name").into());
    }

    let existing = draft.id.as_deref().and_then(|id| store.school(id)).cloned();
    let school = match existing {
        Some(mut s) => {
            s.name = name;
            if let Some(p) = draft.principal_id {
                s.principal_id = p;
            }
            s
        }
        None => {
            let start = today();
            let id = draft.id.unwrap_or_else(|| Uuid::new_v4().to_string());
            School {
                student_count: store.students(Some(id.as_str())).len(),
                id,
                name,
                is_active: true,
                subscription_end_date: start.checked_add_months(Months::new(12)).unwrap_or(start),
                principal_id: draft.principal_id.unwrap_or_default(),
            }
        }
    };

    let mut schools = store.staged_schools();
    schools.insert(school.id.clone(), school.clone());
    store.commit(Staged {
        schools: Some(schools),
        ..Staged::default()
    })?;
    tracing::info!(school_id = %school.id, "school saved");
    Ok(school)
}

pub fn toggle_school_active(store: &mut Store, session: &Session, school_id: &str) -> Result<School, ServiceError> {
    session.require_system_administrator("manage schools")?;
    let mut schools = store.staged_schools();
    let school = schools.get_mut(school_id).ok_or_else(|| ValidationError::NotFound {
        entity: "school",
        id: school_id.to_string(),
    })?;
    school.is_active = !school.is_active;
    let updated = school.clone();
    store.commit(Staged {
        schools: Some(schools),
        ..Staged::default()
    })?;
    tracing::info!(school_id = %school_id, is_active = updated.is_active, "school subscription toggled");
    Ok(updated)
}

pub fn list_schools(store: &Store, session: &Session) -> Result<Vec<School>, ServiceError> {
    session.require_system_administrator("list schools")?;
    let mut schools: Vec<School> = store.schools().cloned().collect();
    schools.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(schools)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub school_count: usize,
    pub active_school_count: usize,
    pub student_count: usize,
}

pub fn admin_overview(store: &Store, session: &Session) -> Result<AdminOverview, ServiceError> {
    session.require_system_administrator("view the admin overview")?;
    Ok(AdminOverview {
        school_count: store.schools().count(),
        active_school_count: store.schools().filter(|s| s.is_active).count(),
        student_count: store.schools().map(|s| s.student_count).sum(),
    })
}

/// Inserts or replaces a user by id. Usernames are unique ignoring case.
pub fn save_user(store: &mut Store, session: &Session, mut user: User) -> Result<User, ServiceError> {
    session.require_system_administrator("manage users")?;
    user.username = user.username.trim().to_string();
    if user.username.is_empty() {
        return Err(ValidationError::Required("username").into());
    }
    if user.name.trim().is_empty() {
        return Err(ValidationError::Required("name").into());
    }
    if user.id.trim().is_empty() {
        user.id = Uuid::new_v4().to_string();
    }
    if let Some(other) = store.user_by_username(&user.username) {
        if other.id != user.id {
            return Err(ValidationError::UsernameTaken(user.username).into());
        }
    }
    if user.role.is_system_administrator() {
        user.school_id = None;
    } else if user.school_id.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(ValidationError::Required("schoolId").into());
    }
    if !user.role.is_student_bound() {
        user.related_student_id = None;
    }

    let mut users = store.staged_users();
    users.insert(user.id.clone(), user.clone());
    store.commit(Staged {
        users: Some(users),
        ..Staged::default()
    })?;
    tracing::info!(user_id = %user.id, role = ?user.role, "user saved");
    Ok(user)
}

pub fn delete_user(store: &mut Store, session: &Session, user_id: &str) -> Result<(), ServiceError> {
    session.require_system_administrator("manage users")?;
    let mut users = store.staged_users();
    if users.remove(user_id).is_none() {
        return Err(ValidationError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        }
        .into());
    }
    store.commit(Staged {
        users: Some(users),
        ..Staged::default()
    })?;
    Ok(())
}

pub fn list_users(store: &Store, session: &Session, school_id: Option<&str>) -> Result<Vec<User>, ServiceError> {
    session.require_system_administrator("list users")?;
    let mut users: Vec<User> = store
        .users()
        .filter(|u| school_id.map(|id| u.school_id.as_deref() == Some(id)).unwrap_or(true))
        .cloned()
        .collect();
    users.sort_by(|a, b| a.username.to_lowercase().cmp(&b.username.to_lowercase()));
    Ok(users)
}

pub fn update_settings(
    store: &mut Store,
    session: &Session,
    attendance_threshold: u32,
) -> Result<AppSettings, ServiceError> {
    session.require(Permission::ManageSettings, "manage settings")?;
    let settings = AppSettings {
        attendance_threshold: attendance_threshold.min(100),
    };
    store.commit(Staged {
        settings: Some(settings.clone()),
        ..Staged::default()
    })?;
    tracing::info!(attendance_threshold = settings.attendance_threshold, "settings updated");
    Ok(settings)
}
