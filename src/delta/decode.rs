use super::{DeltaError, Method, RecordDelta};
use crate::schema::{Record, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Multi-valued form data: each key maps to one value per submitted row.
pub type PostData = BTreeMap<String, Vec<String>>;

const METHOD_KEY: &str = "method";
const OLD_PREFIX: &str = "old:";
const NEW_PREFIX: &str = "new:";

/// Splits `old:<field>` / `new:<field>` / `method` form data into one delta per row.
///
/// The row count is the length of `method`. Every key, including ones that are otherwise
/// ignored, must carry exactly that many values.
pub fn decode(post_data: &PostData, accepted: &[Method]) -> Result<Vec<RecordDelta>, DeltaError> {
    let tokens: &[String] = post_data
        .get(METHOD_KEY)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut deltas = Vec::with_capacity(tokens.len());
    for token in tokens {
        let method = Method::parse(token)
            .filter(|m| accepted.contains(m))
            .ok_or_else(|| DeltaError::InvalidMethod {
                token: token.clone(),
                accepted: accepted
                    .iter()
                    .map(|m| format!("\"{}\"", m.as_str()))
                    .collect::<Vec<_>>()
                    .join(" or "),
            })?;
        deltas.push(RecordDelta {
            old: Record::new(),
            new: Record::new(),
            method,
        });
    }

    for (key, values) in post_data {
        if values.len() != deltas.len() {
            return Err(DeltaError::MalformedShape {
                key: key.clone(),
                expected: deltas.len(),
                found: values.len(),
            });
        }

        let (field, is_old) = if let Some(f) = key.strip_prefix(OLD_PREFIX) {
            (f, true)
        } else if let Some(f) = key.strip_prefix(NEW_PREFIX) {
            (f, false)
        } else {
            continue;
        };

        for (delta, value) in deltas.iter_mut().zip(values) {
            let side = if is_old { &mut delta.old } else { &mut delta.new };
            side.insert(field.to_string(), Value::Text(value.clone()));
        }
    }

    Ok(deltas)
}

/// Inverse of [`decode`]: flattens deltas back into form data. Fields missing from a row
/// are sent as "".
pub fn encode(deltas: &[RecordDelta]) -> PostData {
    let mut post = PostData::new();
    post.insert(
        METHOD_KEY.to_string(),
        deltas.iter().map(|d| d.method.as_str().to_string()).collect(),
    );

    let sides: [(&str, fn(&RecordDelta) -> &Record); 2] =
        [(OLD_PREFIX, old_side), (NEW_PREFIX, new_side)];
    for (prefix, side) in sides {
        let names: BTreeSet<&String> = deltas.iter().flat_map(|d| side(d).keys()).collect();
        for name in names {
            let values = deltas
                .iter()
                .map(|d| side(d).get(name).map(Value::to_string).unwrap_or_default())
                .collect();
            post.insert(format!("{prefix}{name}"), values);
        }
    }
    post
}

fn old_side(d: &RecordDelta) -> &Record {
    &d.old
}

fn new_side(d: &RecordDelta) -> &Record {
    &d.new
}

/// Drops "" / null entries so blank search inputs don't constrain a `find`.
pub fn remove_empty_keys(filter: &mut Record) {
    filter.retain(|_, v| !v.is_empty());
}
