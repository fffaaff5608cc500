use crate::admin::{self, SchoolDraft};
use crate::ipc::helpers::{authed, authed_mut, get_optional_str, get_required_str, reply, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, User};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInput {
    #[serde(default)]
    id: String,
    username: String,
    name: String,
    role: Role,
    #[serde(default)]
    school_id: Option<String>,
    #[serde(default)]
    related_student_id: Option<String>,
}

fn handle_schools_list(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (store, session) = authed(state)?;
    let schools = admin::list_schools(store, session)?;
    Ok(json!({ "schools": to_json(&schools)? }))
}

fn handle_schools_save(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let draft = SchoolDraft {
        id: get_optional_str(&req.params, "id"),
        name: get_required_str(&req.params, "name")?,
        principal_id: get_optional_str(&req.params, "principalId"),
    };
    let (store, session) = authed_mut(state)?;
    let school = admin::save_school(store, session, draft)?;
    to_json(&school)
}

fn handle_schools_toggle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let school_id = get_required_str(&req.params, "schoolId")?;
    let (store, session) = authed_mut(state)?;
    let school = admin::toggle_school_active(store, session, &school_id)?;
    to_json(&school)
}

fn handle_users_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let school_id = get_optional_str(&req.params, "schoolId");
    let (store, session) = authed(state)?;
    let users = admin::list_users(store, session, school_id.as_deref())?;
    Ok(json!({ "users": to_json(&users)? }))
}

fn handle_users_save(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let input: UserInput = serde_json::from_value(req.params.clone())
        .map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;
    let user = User {
        id: input.id,
        username: input.username,
        name: input.name,
        role: input.role,
        school_id: input.school_id,
        related_student_id: input.related_student_id,
    };
    let (store, session) = authed_mut(state)?;
    let saved = admin::save_user(store, session, user)?;
    to_json(&saved)
}

fn handle_users_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let user_id = get_required_str(&req.params, "userId")?;
    let (store, session) = authed_mut(state)?;
    if session.user.id == user_id {
        return Err(HandlerErr::new("bad_params", "cannot delete the logged-in user"));
    }
    admin::delete_user(store, session, &user_id)?;
    Ok(json!({ "ok": true }))
}

fn handle_overview(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (store, session) = authed(state)?;
    to_json(&admin::admin_overview(store, session)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "schools.list" => handle_schools_list(state),
        "schools.save" => handle_schools_save(state, req),
        "schools.toggleActive" => handle_schools_toggle(state, req),
        "users.list" => handle_users_list(state, req),
        "users.save" => handle_users_save(state, req),
        "users.delete" => handle_users_delete(state, req),
        "admin.overview" => handle_overview(state),
        _ => return None,
    };
    Some(reply(req, result))
}
