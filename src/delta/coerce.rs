use super::{DeltaError, Method, RecordDelta};
use crate::schema::{Entity, Record, Value};
use crate::validate::is_unsigned_decimal;

/// Casts the entity's required numeric fields from form strings to integers, in place.
///
/// The old side of INSERT rows is never looked at: there is no previous row behind it.
/// Everything else is left as text; entity-level validation happens when the batch is
/// reconciled.
pub fn coerce_numbers(deltas: &mut [RecordDelta], entity: &Entity) -> Result<(), DeltaError> {
    for field in entity.fields().iter().filter(|f| f.kind.is_coerced_number()) {
        for delta in deltas.iter_mut() {
            if delta.method != Method::Insert {
                coerce_value(&mut delta.old, field.name)?;
            }
            coerce_value(&mut delta.new, field.name)?;
        }
    }
    Ok(())
}

fn coerce_value(record: &mut Record, field: &str) -> Result<(), DeltaError> {
    let parsed = match record.get(field) {
        Some(Value::Int(n)) if *n >= 0 => return Ok(()),
        Some(Value::Text(raw)) if is_unsigned_decimal(raw) => raw.parse::<i64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) => {
            record.insert(field.to_string(), Value::Int(n));
            Ok(())
        }
        None => Err(DeltaError::InvalidFieldValue {
            field: field.to_string(),
            value: record.get(field).cloned().unwrap_or(Value::Null),
        }),
    }
}
