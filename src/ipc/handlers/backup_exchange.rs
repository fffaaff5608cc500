use crate::backup;
use crate::ipc::helpers::{authed, authed_mut, get_required_str, reply, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

// Snapshots span every tenant, so only a system administrator may take or
// apply one.
fn require_admin(state: &AppState, action: &'static str) -> Result<(), HandlerErr> {
    let (_, session) = authed(state)?;
    session.require_system_administrator(action)?;
    Ok(())
}

/// Drops the session when its user did not survive a restore or clear.
fn revalidate_session(state: &mut AppState) {
    let still_there = match (&state.store, &state.session) {
        (Some(store), Some(session)) => store.user(&session.user.id).is_some(),
        _ => false,
    };
    if !still_there && state.session.take().is_some() {
        tracing::info!("session ended: user no longer present after data replacement");
    }
}

fn handle_create(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state, "create backups")?;
    let (store, _) = authed(state)?;
    to_json(&backup::create_backup(store))
}

fn handle_restore(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state, "restore backups")?;
    let blob = match req.params.get("snapshot") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(v @ serde_json::Value::Object(_)) => v.to_string(),
        _ => return Err(HandlerErr::new("bad_params", "missing snapshot")),
    };
    let (store, _) = authed_mut(state)?;
    let restored = backup::try_restore_backup(store, &blob).map_err(|e| {
        tracing::warn!(error = %e, "restore rejected");
        HandlerErr::new("restore_failed", e.to_string())
    })?;
    revalidate_session(state);
    to_json(&restored)
}

fn handle_clear(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state, "clear all data")?;
    let (store, _) = authed_mut(state)?;
    backup::clear_all_data(store)?;
    revalidate_session(state);
    Ok(json!({ "ok": true }))
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state, "export backup bundles")?;
    let out_path = PathBuf::from(get_required_str(&req.params, "outPath")?);
    let (store, _) = authed(state)?;
    let summary = backup::export_backup_bundle(store, &out_path)
        .map_err(|e| HandlerErr::new("bundle_export_failed", format!("{:#}", e)))?;
    to_json(&summary)
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    require_admin(state, "import backup bundles")?;
    let in_path = PathBuf::from(get_required_str(&req.params, "inPath")?);
    let (store, _) = authed_mut(state)?;
    let summary = backup::import_backup_bundle(store, &in_path)
        .map_err(|e| HandlerErr::new("bundle_import_failed", format!("{:#}", e)))?;
    revalidate_session(state);
    to_json(&summary)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.create" => handle_create(state),
        "backup.restore" => handle_restore(state, req),
        "backup.clear" => handle_clear(state),
        "backup.exportBundle" => handle_export_bundle(state, req),
        "backup.importBundle" => handle_import_bundle(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}
