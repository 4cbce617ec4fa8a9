pub mod core;
pub mod edit;
pub mod records;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::schema::{Entity, Record};
use rusqlite::Connection;

fn respond(req: &Request, res: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match res {
        Ok(result) => ok(&req.id, result),
        Err(e) => {
            tracing::debug!(method = %req.method, code = e.code, message = %e.message, "request failed");
            e.response(&req.id)
        }
    }
}

fn db_conn<'a>(state: &'a AppState) -> Result<&'a Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn required_str<'r>(req: &'r Request, key: &str) -> Result<&'r str, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing params.{key}")))
}

fn entity_param<'a>(state: &'a AppState, req: &Request) -> Result<&'a Entity, HandlerErr> {
    let name = required_str(req, "entity")?;
    state
        .schema
        .get(name)
        .ok_or_else(|| HandlerErr::new("unknown_entity", format!("unknown entity: {name}")))
}

/// `params.<key>` as a record; absent or null gives an empty one.
fn record_param(req: &Request, key: &str) -> Result<Record, HandlerErr> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(Record::new()),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
            HandlerErr::new(
                "bad_params",
                format!("params.{key} must map field names to strings, integers or null: {e}"),
            )
        }),
    }
}

/// Keeps only the entity's fields, plus `id` when the row has one.
fn project(entity: &Entity, row: &Record) -> Record {
    row.iter()
        .filter(|(k, _)| k.as_str() == "id" || entity.field(k).is_some())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
