//! The edit-table workflow: turn a submitted form into a confirmable decision set, then
//! write it row by row.

use crate::delta::{
    coerce_numbers, decode, default_headers, reconcile, DeltaError, Method, PostData,
    Reconciliation, RecordDelta,
};
use crate::junction::{junction_spec, Outcome, Resolver};
use crate::schema::{describe_record, Entity};
use crate::store::{CollectionSource, StoreError};
use serde::Serialize;
use uuid::Uuid;

/// Decode, coerce and reconcile a submission. Nothing is written.
pub fn prepare(
    entity: &Entity,
    post_data: &PostData,
    accepted: &[Method],
) -> Result<Reconciliation, DeltaError> {
    let mut deltas = decode(post_data, accepted)?;
    coerce_numbers(&mut deltas, entity)?;
    let headers = default_headers(entity);
    reconcile(&deltas, entity, &headers)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: String,
    pub total: usize,
    pub committed: usize,
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_ok() {
            format!("{} Edits Made", self.committed)
        } else {
            format!(
                "{} Edits Made With {} Errors",
                self.committed,
                self.errors.len()
            )
        }
    }
}

/// Applies `effective` in order. A failing row is recorded and the batch carries on; rows
/// already written stay written.
pub fn commit(
    source: &dyn CollectionSource,
    entity: &Entity,
    effective: &[RecordDelta],
) -> BatchReport {
    let batch_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("commit", batch = %batch_id, entity = entity.name());
    let _guard = span.enter();

    let resolver = Resolver::new(source);
    let is_junction = junction_spec(entity.name()).is_some();

    let mut report = BatchReport {
        batch_id,
        total: effective.len(),
        committed: 0,
        errors: Vec::new(),
    };
    for (row, delta) in effective.iter().enumerate() {
        let outcome = if is_junction {
            resolver.apply(entity.name(), delta)
        } else {
            apply_direct(source, entity, delta)
        };
        if outcome.is_ok {
            report.committed += 1;
        } else {
            tracing::warn!(row, method = delta.method.as_str(), message = %outcome.message, "row not committed");
            report.errors.push(outcome.message);
        }
    }
    tracing::info!(
        total = report.total,
        committed = report.committed,
        failed = report.errors.len(),
        "batch finished"
    );
    report
}

/// Plain entities map one-to-one onto their table, so records are written as they are.
fn apply_direct(source: &dyn CollectionSource, entity: &Entity, delta: &RecordDelta) -> Outcome {
    let Some(coll) = source.collection(entity.name()) else {
        return Outcome::failed(
            delta.method,
            StoreError::UnknownCollection(entity.name().to_string()),
        );
    };
    let res = match delta.method {
        Method::Insert => coll.insert(&delta.new).map(|()| 1),
        Method::Update => coll.update(&delta.old, &delta.new),
        Method::Delete => coll.delete(&delta.old),
    };
    match res {
        Ok(0) => {
            tracing::warn!(filter = %describe_record(&delta.old), "no rows matched");
            Outcome::success()
        }
        Ok(_) => Outcome::success(),
        Err(e) => Outcome::failed(delta.method, e),
    }
}
