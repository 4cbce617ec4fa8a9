use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::schema::Schema;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub schema: Schema,
}

impl AppState {
    pub fn new(schema: Schema) -> Self {
        Self {
            workspace: None,
            db: None,
            schema,
        }
    }
}
