// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Primary-key value of a record. Kept as JSON so numeric keys stay numeric
/// when injected back into a write payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Value);

impl RecordId {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Text used in the `/records/{id}` path segment.
    pub fn path_segment(&self) -> String {
        match &self.0 {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    pub fn is_missing(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(text) => text.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segment())
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<Value> for RecordId {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
