use crate::admin;
use crate::ipc::helpers::{authed, authed_mut, reply, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Permission;
use serde_json::json;

fn current(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let (store, _) = authed(state)?;
    Ok(json!({
        "attendanceThreshold": store.settings().attendance_threshold,
        "schoolName": state.school_name,
    }))
}

fn handle_get(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    current(state)
}

/// `attendanceThreshold` is persisted; `schoolName` only overrides the
/// display name for this process. An empty name clears the override.
fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let threshold = match req.params.get("attendanceThreshold") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_u64()
                .ok_or_else(|| HandlerErr::new("bad_params", "attendanceThreshold must be a non-negative integer"))?,
        ),
    };
    let school_name = match req.params.get("schoolName") {
        None => None,
        Some(v) => Some(v.as_str().map(|s| s.trim().to_string()).unwrap_or_default()),
    };

    {
        let (store, session) = authed_mut(state)?;
        session.require(Permission::ManageSettings, "manage settings")?;
        if let Some(t) = threshold {
            let clamped = u32::try_from(t).unwrap_or(u32::MAX);
            admin::update_settings(store, session, clamped)?;
        }
    }
    if let Some(name) = school_name {
        state.school_name = (!name.is_empty()).then_some(name);
    }
    current(state)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.get" => handle_get(state),
        "settings.update" => handle_update(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}
