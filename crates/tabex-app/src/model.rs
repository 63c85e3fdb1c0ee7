// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row: column name to untyped value, in the order the server sent it.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub table_type: Option<String>,
}

impl TableMetadata {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub is_nullable: bool,
}

impl ColumnMetadata {
    pub fn kind(&self) -> FieldKind {
        FieldKind::from_type(&self.column_type)
    }

    pub fn is_numeric(&self) -> bool {
        is_numeric_type(&self.column_type)
    }

    pub fn is_required(&self) -> bool {
        !self.is_nullable && !self.is_primary_key
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnMetadata>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl TableSchema {
    pub fn primary_key(&self) -> Option<&ColumnMetadata> {
        self.columns
            .as_deref()
            .and_then(|columns| columns.iter().find(|column| column.is_primary_key))
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key().is_some()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .as_deref()
            .and_then(|columns| columns.iter().find(|column| column.name == name))
    }

    /// Name used to address records: the primary key, or `id` as a guess.
    pub fn id_field(&self) -> &str {
        self.primary_key()
            .map(|column| column.name.as_str())
            .unwrap_or(DEFAULT_ID_FIELD)
    }
}

pub const DEFAULT_ID_FIELD: &str = "id";

/// Column types the form coerces back to numbers on save.
pub const NUMERIC_TYPES: [&str; 6] = [
    "number",
    "integer",
    "decimal",
    "float",
    "double precision",
    "bigint",
];

pub fn is_numeric_type(column_type: &str) -> bool {
    let lowered = column_type.to_ascii_lowercase();
    NUMERIC_TYPES.contains(&lowered.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    LongText,
    Number,
    Date,
    Boolean,
    Unknown,
}

impl FieldKind {
    pub fn from_type(column_type: &str) -> Self {
        match column_type.to_ascii_lowercase().as_str() {
            "string" | "varchar" | "char" | "text" => Self::Text,
            "number" | "integer" | "decimal" | "float" | "double precision" | "bigint" => {
                Self::Number
            }
            "date" => Self::Date,
            "boolean" => Self::Boolean,
            "longtext" => Self::LongText,
            _ => Self::Unknown,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::LongText => "long text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "toggle",
            Self::Unknown => "text",
        }
    }

    pub const fn is_multiline(self) -> bool {
        matches!(self, Self::LongText)
    }
}
