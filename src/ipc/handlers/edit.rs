use super::{db_conn, entity_param, record_param, respond};
use crate::delta::{encode, remove_empty_keys, Method, PostData, Reconciliation};
use crate::edit::{commit, prepare};
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::schema::{Entity, Record};
use crate::store::{Collection, Registry, StoreError};
use serde_json::json;

fn accepted_methods(req: &Request) -> Result<Vec<Method>, HandlerErr> {
    match req.params.get("methods") {
        None | Some(serde_json::Value::Null) => Ok(Method::ALL.to_vec()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().and_then(Method::parse).ok_or_else(|| {
                    HandlerErr::new("bad_params", format!("unknown edit method: {v}"))
                })
            })
            .collect(),
        Some(_) => Err(HandlerErr::new(
            "bad_params",
            "params.methods must be a list of INSERT, UPDATE or DELETE",
        )),
    }
}

fn form_param(req: &Request) -> Result<PostData, HandlerErr> {
    let Some(form) = req.params.get("form") else {
        return Err(HandlerErr::new("bad_params", "missing params.form"));
    };
    serde_json::from_value(form.clone()).map_err(|e| {
        HandlerErr::new(
            "bad_params",
            format!("params.form must map keys to lists of strings: {e}"),
        )
    })
}

/// Submission that survives reconciliation with at least one row left to write.
fn prepared(entity: &Entity, req: &Request) -> Result<Reconciliation, HandlerErr> {
    let form = form_param(req)?;
    let accepted = accepted_methods(req)?;
    let rec = prepare(entity, &form, &accepted)?;
    if rec.is_empty() {
        return Err(HandlerErr::new("no_changes", "No changes made!")
            .with_details(json!({ "status": 400, "skipped": rec.skipped })));
    }
    Ok(rec)
}

fn views(entity: &Entity, rec: &Reconciliation) -> Result<serde_json::Value, HandlerErr> {
    let mut out = serde_json::to_value(rec)
        .map_err(|e| HandlerErr::new("internal", format!("failed to encode views: {e}")))?;
    out["entity"] = json!(entity.name());
    Ok(out)
}

fn editable_row(entity: &Entity, row: &Record) -> Record {
    entity
        .fields()
        .iter()
        .filter_map(|f| row.get(f.name).map(|v| (f.name.to_string(), v.clone())))
        .collect()
}

fn handle_edit_search(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let entity = entity_param(state, req)?;
    let conn = db_conn(state)?;
    let mut filter = record_param(req, "filter")?;
    remove_empty_keys(&mut filter);

    let registry = Registry::new(conn);
    let coll = registry.get(entity.name()).ok_or_else(|| {
        HandlerErr::new("unknown_entity", format!("no collection for {}", entity.name()))
    })?;
    let rows: Vec<Record> = match coll.find(&filter) {
        Ok(rows) => rows.iter().map(|r| editable_row(entity, r)).collect(),
        // A search on a column the table doesn't have simply finds nothing.
        Err(StoreError::UnknownColumn { column, .. }) => {
            tracing::warn!(entity = entity.name(), %column, "search on unknown column");
            Vec::new()
        }
        Err(e) => return Err(HandlerErr::new("db_query_failed", e.to_string())),
    };
    Ok(json!({
        "entity": entity.name(),
        "headers": entity.field_names(),
        "rows": rows,
    }))
}

fn handle_edit_confirm(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let entity = entity_param(state, req)?;
    let rec = prepared(entity, req)?;
    let mut out = views(entity, &rec)?;
    out["form"] = json!(encode(&rec.effective));
    Ok(out)
}

fn handle_edit_commit(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let entity = entity_param(state, req)?;
    let conn = db_conn(state)?;
    let rec = prepared(entity, req)?;

    let registry = Registry::new(conn);
    let report = commit(&registry, entity, &rec.effective);
    if !report.is_ok() {
        return Err(HandlerErr::new("commit_failed", report.summary()).with_details(json!({
            "status": 500,
            "batchId": report.batch_id,
            "total": report.total,
            "committed": report.committed,
            "errors": report.errors,
        })));
    }

    let mut out = views(entity, &rec)?;
    out["message"] = json!(report.summary());
    out["batch"] = json!(report);
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "edit.search" => handle_edit_search(state, req),
        "edit.confirm" => handle_edit_confirm(state, req),
        "edit.commit" => handle_edit_commit(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
