// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::{Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::{
    ColumnMetadata, DEFAULT_ID_FIELD, FieldKind, Record, RecordId, TableSchema, format_value,
    is_numeric_type, parse_boolean_text, plain_text,
};

pub const REQUIRED_FIELD_MESSAGE: &str = "This field is required";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("cannot create a new record without schema information")]
    SchemaRequiredForCreate,
    #[error("required fields are empty: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),
    #[error("field {0:?} is not part of this form")]
    UnknownField(String),
    #[error("field {0:?} is read-only")]
    ReadOnlyField(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditableField {
    pub name: String,
    pub value: Value,
    pub column_type: String,
    pub kind: FieldKind,
    pub is_required: bool,
    pub is_primary_key: bool,
}

impl EditableField {
    fn from_column(column: &ColumnMetadata, value: Value) -> Self {
        Self {
            name: column.name.clone(),
            value,
            column_type: column.column_type.clone(),
            kind: column.kind(),
            is_required: column.is_required(),
            is_primary_key: column.is_primary_key,
        }
    }

    pub fn is_blank(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::String(text) => text.is_empty(),
            _ => false,
        }
    }

    /// Text shown inside an input widget.
    pub fn input_text(&self) -> String {
        plain_text(&self.value)
    }

    /// Read-only rendering; `None` means the value is null.
    pub fn display(&self) -> Option<String> {
        if self.value.is_null() {
            return None;
        }
        Some(format_value(&self.value, &self.column_type))
    }

    pub fn is_checked(&self) -> bool {
        match &self.value {
            Value::Bool(flag) => *flag,
            Value::Number(number) => number.as_f64().is_some_and(|parsed| parsed != 0.0),
            Value::String(text) => parse_boolean_text(text).unwrap_or(!text.is_empty()),
            Value::Null => false,
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

/// Where the field list came from. The two sources never mix.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldLayout {
    Schema(Vec<ColumnMetadata>),
    Inferred { id_field: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormTarget {
    New,
    Existing(RecordId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavePayload {
    pub data: Record,
    /// Numeric fields whose input did not parse and were sent as text.
    pub coercion_fallbacks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordForm {
    table: String,
    target: FormTarget,
    layout: FieldLayout,
    fields: Vec<EditableField>,
    errors: BTreeMap<String, String>,
}

impl RecordForm {
    pub fn for_existing(table: &str, schema: Option<&TableSchema>, record: &Record) -> Self {
        let id_field = schema
            .map(TableSchema::id_field)
            .unwrap_or(DEFAULT_ID_FIELD)
            .to_owned();
        let record_id = RecordId::new(record.get(&id_field).cloned().unwrap_or(Value::Null));

        let (layout, fields) = match schema.and_then(|schema| schema.columns.clone()) {
            Some(columns) => {
                let fields = columns
                    .iter()
                    .map(|column| {
                        let value = record.get(&column.name).cloned().unwrap_or(Value::Null);
                        EditableField::from_column(column, value)
                    })
                    .collect();
                (FieldLayout::Schema(columns), fields)
            }
            None => {
                let fields = record
                    .iter()
                    .map(|(key, value)| {
                        let column_type = if value.is_number() { "number" } else { "string" };
                        EditableField {
                            name: key.clone(),
                            value: value.clone(),
                            column_type: column_type.to_owned(),
                            kind: FieldKind::from_type(column_type),
                            is_required: *key == id_field,
                            is_primary_key: *key == id_field,
                        }
                    })
                    .collect();
                (FieldLayout::Inferred { id_field }, fields)
            }
        };

        Self {
            table: table.to_owned(),
            target: FormTarget::Existing(record_id),
            layout,
            fields,
            errors: BTreeMap::new(),
        }
    }

    pub fn for_new(table: &str, schema: Option<&TableSchema>) -> Result<Self, FormError> {
        let columns = schema
            .and_then(|schema| schema.columns.clone())
            .ok_or(FormError::SchemaRequiredForCreate)?;
        let fields = columns
            .iter()
            .map(|column| {
                let value = if column.is_primary_key {
                    Value::Null
                } else {
                    Value::String(String::new())
                };
                EditableField::from_column(column, value)
            })
            .collect();

        Ok(Self {
            table: table.to_owned(),
            target: FormTarget::New,
            layout: FieldLayout::Schema(columns),
            fields,
            errors: BTreeMap::new(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn target(&self) -> &FormTarget {
        &self.target
    }

    pub fn is_new(&self) -> bool {
        self.target == FormTarget::New
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn fields(&self) -> &[EditableField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&EditableField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn id_field(&self) -> &str {
        match &self.layout {
            FieldLayout::Schema(columns) => columns
                .iter()
                .find(|column| column.is_primary_key)
                .map(|column| column.name.as_str())
                .unwrap_or(DEFAULT_ID_FIELD),
            FieldLayout::Inferred { id_field } => id_field,
        }
    }

    pub fn record_id(&self) -> Option<&RecordId> {
        match &self.target {
            FormTarget::New => None,
            FormTarget::Existing(id) => Some(id),
        }
    }

    /// False for an existing record whose key value is null or empty; such a
    /// record cannot be written back.
    pub fn is_addressable(&self) -> bool {
        self.record_id().is_none_or(|id| !id.is_missing())
    }

    pub fn title(&self) -> String {
        match &self.target {
            FormTarget::New => "New Record".to_owned(),
            FormTarget::Existing(id) => format!("Record: {id}"),
        }
    }

    pub fn is_read_only(&self, name: &str) -> bool {
        !self.is_new() && self.field(name).is_some_and(|field| field.is_primary_key)
    }

    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), FormError> {
        if self.is_read_only(name) {
            return Err(FormError::ReadOnlyField(name.to_owned()));
        }
        let field = self
            .fields
            .iter_mut()
            .find(|field| field.name == name)
            .ok_or_else(|| FormError::UnknownField(name.to_owned()))?;
        field.value = value;
        self.errors.remove(name);
        Ok(())
    }

    pub fn set_text(&mut self, name: &str, text: impl Into<String>) -> Result<(), FormError> {
        self.set_value(name, Value::String(text.into()))
    }

    pub fn toggle(&mut self, name: &str) -> Result<bool, FormError> {
        let checked = self
            .field(name)
            .map(EditableField::is_checked)
            .ok_or_else(|| FormError::UnknownField(name.to_owned()))?;
        self.set_value(name, Value::Bool(!checked))?;
        Ok(!checked)
    }

    pub fn error(&self, name: &str) -> Option<&str> {
        self.errors.get(name).map(String::as_str)
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn validate(&mut self) -> Result<(), FormError> {
        self.errors = self
            .fields
            .iter()
            .filter(|field| field.is_required && field.is_blank())
            .map(|field| (field.name.clone(), REQUIRED_FIELD_MESSAGE.to_owned()))
            .collect();

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(FormError::ValidationFailed(
                self.errors.keys().cloned().collect(),
            ))
        }
    }

    pub fn build_payload(&self) -> SavePayload {
        let mut data = Record::new();
        let mut coercion_fallbacks = Vec::new();

        for field in &self.fields {
            if self.is_new() && field.is_primary_key && field.value.is_null() {
                continue;
            }

            let value = if is_numeric_type(&field.column_type) {
                match coerce_numeric(&field.value) {
                    Coerced::Number(number) => number,
                    Coerced::Unchanged => field.value.clone(),
                    Coerced::Unparsable => {
                        coercion_fallbacks.push(field.name.clone());
                        field.value.clone()
                    }
                }
            } else {
                field.value.clone()
            };
            data.insert(field.name.clone(), value);
        }

        SavePayload {
            data,
            coercion_fallbacks,
        }
    }

    /// Validates, then builds the outgoing payload. Nothing is built when a
    /// required field is blank.
    pub fn prepare_save(&mut self) -> Result<SavePayload, FormError> {
        self.validate()?;
        Ok(self.build_payload())
    }
}

enum Coerced {
    Number(Value),
    Unchanged,
    Unparsable,
}

fn coerce_numeric(value: &Value) -> Coerced {
    let Value::String(text) = value else {
        return Coerced::Unchanged;
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Coerced::Unchanged;
    }
    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Coerced::Number(number_value(parsed)),
        _ => Coerced::Unparsable,
    }
}

fn number_value(parsed: f64) -> Value {
    if parsed.fract() == 0.0 && parsed.abs() < 9.0e15 {
        return Value::from(parsed as i64);
    }
    Number::from_f64(parsed)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
