use crate::access::authenticate;
use crate::ipc::helpers::{get_required_str, reply, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let username = get_required_str(&req.params, "username")?;
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let session = authenticate(store, &username)?;
    let out = to_json(&session)?;
    state.session = Some(session);
    Ok(out)
}

fn handle_logout(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let was = state.session.take().is_some();
    Ok(json!({ "loggedOut": was }))
}

fn handle_session(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    match &state.session {
        Some(s) => to_json(s),
        None => Ok(serde_json::Value::Null),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => handle_login(state, req),
        "auth.logout" => handle_logout(state),
        "auth.session" => handle_session(state),
        _ => return None,
    };
    Some(reply(req, result))
}
