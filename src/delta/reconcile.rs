use super::{DeltaError, Method, RecordDelta};
use crate::schema::{Entity, Record, Value};
use serde::Serialize;

/// A cell of the delta view. DELETE rows are rendered struck through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DisplayCell {
    Plain { value: Value },
    Struck { value: Value },
}

impl DisplayCell {
    pub fn value(&self) -> &Value {
        match self {
            DisplayCell::Plain { value } | DisplayCell::Struck { value } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaRow {
    pub method: Method,
    pub cells: Vec<DisplayCell>,
}

/// Confirm-step payload: both table views plus the deltas that still need committing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub headers: Vec<String>,
    pub old_view: Vec<Vec<Value>>,
    pub delta_view: Vec<DeltaRow>,
    #[serde(skip)]
    pub effective: Vec<RecordDelta>,
    pub skipped: usize,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.effective.is_empty()
    }
}

pub fn default_headers(entity: &Entity) -> Vec<&'static str> {
    entity.field_names()
}

/// Validates every row against `entity` and drops UPDATE rows that change nothing.
///
/// Any validation failure aborts the batch. Never touches the store.
pub fn reconcile(
    deltas: &[RecordDelta],
    entity: &Entity,
    headers: &[&str],
) -> Result<Reconciliation, DeltaError> {
    let mut out = Reconciliation {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        old_view: Vec::new(),
        delta_view: Vec::new(),
        effective: Vec::new(),
        skipped: 0,
    };

    for delta in deltas {
        let old = match delta.method {
            Method::Insert => Record::new(),
            _ => entity.instantiate(&delta.old)?,
        };
        let new = entity.instantiate(&delta.new)?;

        if delta.method == Method::Update && old == new {
            out.skipped += 1;
            continue;
        }

        let old_cells = row_cells(&old, headers);
        let cells = match delta.method {
            Method::Delete => old_cells
                .iter()
                .cloned()
                .map(|value| DisplayCell::Struck { value })
                .collect(),
            _ => row_cells(&new, headers)
                .into_iter()
                .map(|value| DisplayCell::Plain { value })
                .collect(),
        };

        out.old_view.push(old_cells);
        out.delta_view.push(DeltaRow {
            method: delta.method,
            cells,
        });
        out.effective.push(RecordDelta {
            old,
            new,
            method: delta.method,
        });
    }

    Ok(out)
}

fn row_cells(record: &Record, headers: &[&str]) -> Vec<Value> {
    headers
        .iter()
        .map(|h| record.get(*h).cloned().unwrap_or(Value::Null))
        .collect()
}
