use crate::models::error::{ForwardError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A log record as handed over by the logging pipeline.
///
/// `level` and `message` are always present. Everything else the caller
/// attached, the opt-in flag included, sits flat in `fields` in the order it
/// was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputLogRecord {
    pub level: String,
    pub message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InputLogRecord {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Parse a flat JSON object such as `{"level":"info","message":"m","userId":42}`.
    pub fn from_json(line: &str) -> Result<Self> {
        serde_json::from_str(line).map_err(ForwardError::InvalidRecord)
    }
}
