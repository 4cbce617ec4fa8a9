use super::{required_str, respond};
use crate::db;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
    }))
}

fn handle_workspace_select(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let path = PathBuf::from(required_str(req, "path")?);
    let conn =
        db::open_db(&path).map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    // Dropping the previous connection closes it.
    state.db = Some(conn);
    state.workspace = Some(path.clone());
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
