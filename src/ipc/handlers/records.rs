use super::{db_conn, entity_param, project, record_param, respond};
use crate::delta::{coerce_numbers, remove_empty_keys, DeltaError, Method, RecordDelta};
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Request};
use crate::junction::{junction_spec, Outcome, Resolver};
use crate::schema::{Entity, Record};
use crate::store::{Collection, Registry};
use serde_json::json;

fn describe_entity(entity: &Entity) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = entity
        .fields()
        .iter()
        .map(|f| {
            let mut obj = json!({
                "name": f.name,
                "label": f.label,
                "kind": f.kind.tag(),
                "inputType": f.kind.input_type(),
                "optional": f.kind.is_optional(),
            });
            if let Some(options) = f.kind.options() {
                obj["options"] = json!(options);
            }
            obj
        })
        .collect();
    json!({
        "name": entity.name(),
        "label": entity.label(),
        "junction": junction_spec(entity.name()).is_some(),
        "fields": fields,
    })
}

fn handle_entities_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let entities: Vec<serde_json::Value> = state.schema.entities().map(describe_entity).collect();
    Ok(json!({ "entities": entities }))
}

fn handle_records_validate(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let entity = entity_param(state, req)?;
    let record = record_param(req, "record")?;
    let record = entity.instantiate(&record).map_err(DeltaError::from)?;
    Ok(json!({ "entity": entity.name(), "record": record }))
}

fn insert_failed(outcome: Outcome) -> HandlerErr {
    HandlerErr::new("db_insert_failed", outcome.message).with_details(json!({ "status": 409 }))
}

fn handle_records_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let entity = entity_param(state, req)?;
    let conn = db_conn(state)?;

    let mut single = [RecordDelta {
        old: Record::new(),
        new: record_param(req, "record")?,
        method: Method::Insert,
    }];
    coerce_numbers(&mut single, entity)?;
    let [delta] = single;
    let record = entity.instantiate(&delta.new).map_err(DeltaError::from)?;

    let registry = Registry::new(conn);
    if junction_spec(entity.name()).is_some() {
        let outcome = Resolver::new(&registry).insert(entity.name(), &record);
        if !outcome.is_ok {
            return Err(insert_failed(outcome));
        }
    } else {
        let coll = registry.get(entity.name()).ok_or_else(|| {
            HandlerErr::new("unknown_entity", format!("no collection for {}", entity.name()))
        })?;
        if let Err(e) = coll.insert(&record) {
            if !e.is_integrity() {
                return Err(HandlerErr::new("db_query_failed", e.to_string()));
            }
            return Err(insert_failed(Outcome::failed(Method::Insert, e)));
        }
    }
    tracing::info!(entity = entity.name(), "record added");
    Ok(json!({ "entity": entity.name(), "record": record }))
}

fn handle_records_view(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let entity = entity_param(state, req)?;
    let conn = db_conn(state)?;
    let mut filter = record_param(req, "filter")?;
    remove_empty_keys(&mut filter);

    let registry = Registry::new(conn);
    let coll = registry.get(entity.name()).ok_or_else(|| {
        HandlerErr::new("unknown_entity", format!("no collection for {}", entity.name()))
    })?;
    let rows: Vec<Record> = coll
        .find(&filter)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?
        .iter()
        .map(|row| project(entity, row))
        .collect();
    Ok(json!({
        "entity": entity.name(),
        "headers": entity.field_names(),
        "rows": rows,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "entities.list" => handle_entities_list(state, req),
        "records.validate" => handle_records_validate(state, req),
        "records.add" => handle_records_add(state, req),
        "records.view" => handle_records_view(state, req),
        _ => return None,
    };
    Some(respond(req, res))
}
