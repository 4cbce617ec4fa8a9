//! Edit-table submissions as row deltas.
//!
//! A submission is decoded into [`RecordDelta`]s, numeric fields are coerced, and the batch is
//! reconciled against its entity before anything is written.

mod coerce;
mod decode;
mod reconcile;

pub use coerce::coerce_numbers;
pub use decode::{decode, encode, remove_empty_keys, PostData};
pub use reconcile::{default_headers, reconcile, Reconciliation};

use crate::schema::{Record, ValidationFailed, Value};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Insert,
    Update,
    Delete,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Update, Method::Delete, Method::Insert];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Insert => "INSERT",
            Method::Update => "UPDATE",
            Method::Delete => "DELETE",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "INSERT" => Some(Method::Insert),
            "UPDATE" => Some(Method::Update),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }

    pub(crate) fn progressive(self) -> &'static str {
        match self {
            Method::Insert => "INSERTING",
            Method::Update => "UPDATING",
            Method::Delete => "DELETING",
        }
    }
}

/// One row's change: the values before and after, and what to do with them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordDelta {
    pub old: Record,
    pub new: Record,
    pub method: Method,
}

/// Failures that reject a whole submission before any write.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeltaError {
    #[error("Inconsistent number of records: `{key}` has {found} values, expected {expected}")]
    MalformedShape {
        key: String,
        expected: usize,
        found: usize,
    },
    #[error("field `method` must be one of {accepted}, got `{token}`")]
    InvalidMethod { token: String, accepted: String },
    #[error("field `{field}`: `{value}` is not a number.")]
    InvalidFieldValue { field: String, value: Value },
    #[error(transparent)]
    ValidationFailed(#[from] ValidationFailed),
}

impl DeltaError {
    pub fn code(&self) -> &'static str {
        match self {
            DeltaError::MalformedShape { .. }
            | DeltaError::InvalidMethod { .. }
            | DeltaError::InvalidFieldValue { .. } => "invalid_post_data",
            DeltaError::ValidationFailed(_) => "validation_failed",
        }
    }

    /// HTTP-equivalent status for front ends that proxy these responses.
    pub fn status(&self) -> u16 {
        match self {
            DeltaError::ValidationFailed(_) => 400,
            _ => 409,
        }
    }
}
