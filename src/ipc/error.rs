use crate::delta::DeltaError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<DeltaError> for HandlerErr {
    fn from(e: DeltaError) -> Self {
        let mut details = json!({ "status": e.status() });
        match &e {
            DeltaError::MalformedShape { key, .. } => details["key"] = json!(key),
            DeltaError::InvalidMethod { token, .. } => details["method"] = json!(token),
            DeltaError::InvalidFieldValue { field, value } => {
                details["field"] = json!(field);
                details["value"] = json!(value);
            }
            DeltaError::ValidationFailed(v) => {
                details["field"] = json!(v.field);
                details["value"] = json!(v.value);
            }
        }
        HandlerErr::new(e.code(), e.to_string()).with_details(details)
    }
}
