mod entity;
mod field;
mod value;

pub use entity::{Entity, Schema, ValidationFailed};
pub use value::{describe_record, Record, Value};
