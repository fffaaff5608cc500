use crate::admin;
use crate::db::SqliteBackend;
use crate::ipc::helpers::{get_required_str, reply, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use anyhow::Context;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Opens (or creates) the workspace database and makes it current. Any
/// logged-in session is dropped. Returns true when the bootstrap
/// administrator had to be created.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<bool> {
    let backend = SqliteBackend::open(path)?;
    let mut store = Store::open(backend).context("failed to load workspace collections")?;
    let seeded = admin::bootstrap_admin(&mut store).context("failed to seed administrator")?;

    state.workspace = Some(path.to_path_buf());
    state.store = Some(store);
    state.session = None;
    tracing::info!(workspace = %path.to_string_lossy(), seeded, "workspace opened");
    Ok(seeded)
}

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
        "authenticated": state.session.is_some(),
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(get_required_str(&req.params, "path")?);
    let seeded = open_workspace(state, &path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{:#}", e)))?;
    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "bootstrapAdmin": seeded,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}
