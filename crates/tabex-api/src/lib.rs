// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking client for the table explorer REST API.
//!
//! Read paths tolerate several response envelopes. Write paths re-fetch the
//! table schema before every call so the primary key is never stale.

use reqwest::blocking::Client as HttpClient;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tabex_app::{ColumnMetadata, Record, RecordId, TableMetadata, TableSchema};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Extra body field that asks a server to treat a POST as a PUT.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid API base URL {url:?} -- set [api] base_url to an http(s) URL ({message})")]
    InvalidBaseUrl { url: String, message: String },
    #[error("cannot reach {base_url} -- check [api] base_url and that the server is running ({message})")]
    Transport { base_url: String, message: String },
    #[error("Authentication required to access records for table {table}")]
    AuthRequired { table: String },
    #[error("schema not found for table {table}")]
    SchemaNotFound { table: String },
    #[error("Record {id} not found in table {table}")]
    RecordNotFound { table: String, id: String },
    #[error(
        "Records endpoint not found for table {table}. The API might not support this operation."
    )]
    EndpointNotFound { table: String },
    #[error("server does not allow {method} on {url}")]
    MethodNotSupported { method: String, url: String },
    #[error("Cannot {action} record: Table {table} does not have a primary key")]
    PreconditionFailed { action: WriteAction, table: String },
    #[error("Cannot {action} record: it has no primary key value in table {table}")]
    MissingRecordId { action: WriteAction, table: String },
    #[error("cannot {action} record: schema for table {table} is unavailable")]
    SchemaUnavailable {
        action: WriteAction,
        table: String,
        #[source]
        source: Box<ApiError>,
    },
    #[error("{message}")]
    Malformed { message: String },
    #[error("Failed to fetch records for table {table}: {message}")]
    FetchFailed { table: String, message: String },
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("decode {what}: {message}")]
    Decode { what: String, message: String },
}

impl ApiError {
    /// True when a write was refused before any request was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::PreconditionFailed { .. }
                | Self::MissingRecordId { .. }
                | Self::SchemaUnavailable { .. }
        )
    }
}

struct Reply {
    status: StatusCode,
    body: String,
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let invalid = |message: &str| ApiError::InvalidBaseUrl {
            url: base_url.to_owned(),
            message: message.to_owned(),
        };

        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(invalid("must not be empty"));
        }
        let parsed = Url::parse(trimmed).map_err(|error| invalid(&error.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path"));
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| invalid(&format!("build HTTP client: {error}")))?;

        Ok(Self {
            base_url: parsed,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Lists tables and returns how many there are.
    pub fn ping(&self) -> Result<usize, ApiError> {
        self.list_tables().map(|tables| tables.len())
    }

    pub fn list_tables(&self) -> Result<Vec<TableMetadata>, ApiError> {
        let url = self.endpoint(&["tables"])?;
        let reply = self
            .send(Method::GET, url, None)
            .map_err(|error| self.transport_error(error))?;
        if !reply.status.is_success() {
            return Err(ApiError::Http {
                status: reply.status.as_u16(),
                message: clean_error_response(reply.status, &reply.body),
            });
        }
        serde_json::from_str(&reply.body).map_err(|error| ApiError::Decode {
            what: "table list".to_owned(),
            message: error.to_string(),
        })
    }

    pub fn get_schema(&self, table: &str) -> Result<TableSchema, ApiError> {
        let url = self.endpoint(&["tables", table])?;
        let reply = self
            .send(Method::GET, url, None)
            .map_err(|error| self.transport_error(error))?;
        if reply.status == StatusCode::NOT_FOUND {
            return Err(ApiError::SchemaNotFound {
                table: table.to_owned(),
            });
        }
        if !reply.status.is_success() {
            return Err(ApiError::Http {
                status: reply.status.as_u16(),
                message: clean_error_response(reply.status, &reply.body),
            });
        }

        let raw: Value = serde_json::from_str(&reply.body).map_err(|error| ApiError::Decode {
            what: format!("schema for table {table}"),
            message: error.to_string(),
        })?;
        normalize_schema(table, &raw)
    }

    pub fn list_records(&self, table: &str) -> Result<Vec<Record>, ApiError> {
        let fetch_failed = |message: String| ApiError::FetchFailed {
            table: table.to_owned(),
            message,
        };

        let url = self.endpoint(&["tables", table, "records"])?;
        let reply = self
            .send(Method::GET, url, None)
            .map_err(|error| fetch_failed(error.to_string()))?;
        match reply.status {
            StatusCode::UNAUTHORIZED => {
                return Err(ApiError::AuthRequired {
                    table: table.to_owned(),
                });
            }
            StatusCode::NOT_FOUND => {
                return Err(ApiError::EndpointNotFound {
                    table: table.to_owned(),
                });
            }
            status if !status.is_success() => {
                return Err(fetch_failed(clean_error_response(status, &reply.body)));
            }
            _ => {}
        }

        let parsed = serde_json::from_str::<Value>(&reply.body).unwrap_or_else(|error| {
            warn!(table, %error, "records body is not JSON; showing no records");
            Value::Null
        });
        Ok(normalize_records(table, parsed))
    }

    pub fn get_record(&self, table: &str, id: &RecordId) -> Result<Record, ApiError> {
        let url = self.record_url(table, id)?;
        let reply = self
            .send(Method::GET, url, None)
            .map_err(|error| self.transport_error(error))?;
        if reply.status == StatusCode::NOT_FOUND {
            return Err(ApiError::RecordNotFound {
                table: table.to_owned(),
                id: id.to_string(),
            });
        }
        if !reply.status.is_success() {
            return Err(ApiError::Http {
                status: reply.status.as_u16(),
                message: clean_error_response(reply.status, &reply.body),
            });
        }

        let parsed = serde_json::from_str::<Value>(&reply.body).map_err(|_| {
            ApiError::Malformed {
                message: format!("Unexpected response format for record: {}", reply.body),
            }
        })?;
        unwrap_record(parsed)
    }

    /// Updates one record. The primary key is re-read from the schema and
    /// set to `id` in the payload. A 405 from PUT is retried once as a POST
    /// carrying `_method: "PUT"`.
    pub fn update_record(
        &self,
        table: &str,
        id: &RecordId,
        data: &Record,
    ) -> Result<Record, ApiError> {
        require_record_id(table, id, WriteAction::Update)?;
        let primary_key = self.require_primary_key(table, WriteAction::Update)?;
        let mut payload = data.clone();
        payload.insert(primary_key.name, id.value().clone());

        let url = self.record_url(table, id)?;
        let reply = self
            .send(Method::PUT, url.clone(), Some(&payload))
            .map_err(|error| self.transport_error(error))?;
        if reply.status.is_success() {
            return unwrap_write(&reply.body, payload);
        }
        if reply.status != StatusCode::METHOD_NOT_ALLOWED {
            return Err(write_failure(WriteAction::Update, &Method::PUT, &url, &reply));
        }

        warn!(table, %url, "PUT not allowed; retrying once as POST with method override");
        let mut override_payload = payload.clone();
        override_payload.insert(
            METHOD_OVERRIDE_FIELD.to_owned(),
            Value::String("PUT".to_owned()),
        );
        let retry = self
            .send(Method::POST, url.clone(), Some(&override_payload))
            .map_err(|error| self.transport_error(error))?;
        if !retry.status.is_success() {
            return Err(write_failure(WriteAction::Update, &Method::POST, &url, &retry));
        }
        unwrap_write(&retry.body, payload)
    }

    /// Creates one record. A null or missing primary key is left out so the
    /// server can assign it.
    pub fn create_record(&self, table: &str, data: &Record) -> Result<Record, ApiError> {
        let primary_key = self.require_primary_key(table, WriteAction::Create)?;
        let mut payload = data.clone();
        if payload.get(&primary_key.name).is_none_or(Value::is_null) {
            payload.remove(&primary_key.name);
        }

        let url = self.endpoint(&["tables", table, "records"])?;
        let reply = self
            .send(Method::POST, url.clone(), Some(&payload))
            .map_err(|error| self.transport_error(error))?;
        if !reply.status.is_success() {
            return Err(write_failure(WriteAction::Create, &Method::POST, &url, &reply));
        }
        unwrap_write(&reply.body, payload)
    }

    pub fn delete_record(&self, table: &str, id: &RecordId) -> Result<(), ApiError> {
        require_record_id(table, id, WriteAction::Delete)?;
        self.require_primary_key(table, WriteAction::Delete)?;

        let url = self.record_url(table, id)?;
        let reply = self
            .send(Method::DELETE, url.clone(), None)
            .map_err(|error| self.transport_error(error))?;
        if !reply.status.is_success() {
            return Err(write_failure(WriteAction::Delete, &Method::DELETE, &url, &reply));
        }
        Ok(())
    }

    fn require_primary_key(
        &self,
        table: &str,
        action: WriteAction,
    ) -> Result<ColumnMetadata, ApiError> {
        let schema = self
            .get_schema(table)
            .map_err(|error| ApiError::SchemaUnavailable {
                action,
                table: table.to_owned(),
                source: Box::new(error),
            })?;
        schema
            .primary_key()
            .cloned()
            .ok_or_else(|| ApiError::PreconditionFailed {
                action,
                table: table.to_owned(),
            })
    }

    fn record_url(&self, table: &str, id: &RecordId) -> Result<Url, ApiError> {
        self.endpoint(&["tables", table, "records", &id.path_segment()])
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                message: "URL cannot carry a path".to_owned(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Record>,
    ) -> Result<Reply, reqwest::Error> {
        debug!(%method, %url, "api request");
        let mut request = self.http.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        debug!(status = status.as_u16(), %url, "api response");
        Ok(Reply { status, body })
    }

    fn transport_error(&self, error: reqwest::Error) -> ApiError {
        ApiError::Transport {
            base_url: self.base_url.to_string(),
            message: error.to_string(),
        }
    }
}

fn require_record_id(table: &str, id: &RecordId, action: WriteAction) -> Result<(), ApiError> {
    if id.is_missing() {
        return Err(ApiError::MissingRecordId {
            action,
            table: table.to_owned(),
        });
    }
    Ok(())
}

fn normalize_schema(table: &str, raw: &Value) -> Result<TableSchema, ApiError> {
    let Value::Object(object) = raw else {
        return Err(ApiError::Decode {
            what: format!("schema for table {table}"),
            message: "expected a JSON object".to_owned(),
        });
    };

    let primary_keys: Vec<&str> = object
        .get("primaryKey")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let columns = object.get("columns").and_then(Value::as_array).map(|columns| {
        columns
            .iter()
            .filter_map(|column| {
                let name = column.get("name").and_then(Value::as_str)?;
                let column_type = column
                    .get("type")
                    .and_then(Value::as_str)
                    .filter(|column_type| !column_type.is_empty())
                    .unwrap_or("string");
                Some(ColumnMetadata {
                    name: name.to_owned(),
                    display_name: name.to_owned(),
                    column_type: column_type.to_owned(),
                    is_primary_key: primary_keys.contains(&name),
                    is_foreign_key: false,
                    is_nullable: column.get("nullable") == Some(&Value::Bool(true)),
                })
            })
            .collect()
    });

    Ok(TableSchema {
        table_name: object
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(table)
            .to_owned(),
        columns,
        schema: object.get("schema").cloned(),
    })
}

fn normalize_records(table: &str, parsed: Value) -> Vec<Record> {
    let entries = match parsed {
        Value::Object(mut object) => match object.remove("records") {
            Some(Value::Array(entries)) => entries,
            _ => {
                warn!(table, "unexpected records envelope; showing no records");
                return Vec::new();
            }
        },
        Value::Array(entries) => entries,
        Value::Null => return Vec::new(),
        _ => {
            warn!(table, "unexpected records envelope; showing no records");
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match entry {
            Value::Object(record) => Some(record),
            _ => {
                warn!(table, index, "skipping non-object record entry");
                None
            }
        })
        .collect()
}

fn unwrap_record(parsed: Value) -> Result<Record, ApiError> {
    let object = match parsed {
        Value::Object(object) => object,
        other => {
            return Err(ApiError::Malformed {
                message: format!("Unexpected response format for record: {other}"),
            });
        }
    };
    if let Some(Value::Object(record)) = object.get("record") {
        return Ok(record.clone());
    }
    if let Some(error) = object.get("error").filter(|error| is_truthy(error)) {
        return Err(ApiError::Malformed {
            message: match error {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            },
        });
    }
    Ok(object)
}

fn unwrap_write(body: &str, sent: Record) -> Result<Record, ApiError> {
    if body.trim().is_empty() {
        return Ok(sent);
    }
    let parsed = serde_json::from_str::<Value>(body).map_err(|_| ApiError::Malformed {
        message: format!("Unexpected response format for record: {body}"),
    })?;
    unwrap_record(parsed)
}

fn write_failure(action: WriteAction, method: &Method, url: &Url, reply: &Reply) -> ApiError {
    if reply.status == StatusCode::METHOD_NOT_ALLOWED {
        return ApiError::MethodNotSupported {
            method: method.to_string(),
            url: url.to_string(),
        };
    }

    let envelope = serde_json::from_str::<Value>(&reply.body).ok();
    let field = |key: &str| {
        envelope
            .as_ref()
            .and_then(|value| value.get(key))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
    };
    let message = field("error").unwrap_or_else(|| {
        let detail = field("message")
            .unwrap_or_else(|| format!("server returned {}", reply.status.as_u16()));
        format!("Failed to {action} record: {detail}")
    });
    ApiError::Http {
        status: reply.status.as_u16(),
        message,
    }
}

fn clean_error_response(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(envelope)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(Value::String(message)) = envelope.get(key)
                && !message.is_empty()
            {
                return format!("server error ({}): {}", status.as_u16(), message);
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') {
        return format!("server error ({}): {}", status.as_u16(), trimmed);
    }

    format!("server returned {}", status.as_u16())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|parsed| parsed != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ApiError, Client, clean_error_response, normalize_records, normalize_schema,
        unwrap_record, unwrap_write,
    };
    use reqwest::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn clean_error_response_prefers_envelope_messages() {
        assert_eq!(
            clean_error_response(StatusCode::BAD_REQUEST, r#"{"error":"bad column"}"#),
            "server error (400): bad column"
        );
        assert_eq!(
            clean_error_response(StatusCode::FORBIDDEN, r#"{"message":"nope"}"#),
            "server error (403): nope"
        );
        assert_eq!(
            clean_error_response(StatusCode::BAD_GATEWAY, "upstream down"),
            "server error (502): upstream down"
        );
        assert_eq!(
            clean_error_response(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":{}}"#),
            "server returned 500"
        );
    }

    #[test]
    fn schema_normalization_defaults_and_flags() {
        let schema = normalize_schema(
            "users",
            &json!({
                "name": "users",
                "columns": [
                    {"name": "id", "type": "integer", "nullable": false},
                    {"name": "email"},
                    {"name": "bio", "type": "", "nullable": "yes"},
                    {"name": "note", "type": "text", "nullable": true}
                ],
                "primaryKey": ["id"],
                "schema": {"engine": "pg"}
            }),
        )
        .expect("object schema");

        let columns = schema.columns.clone().unwrap_or_default();
        assert_eq!(columns.len(), 4);
        assert!(columns[0].is_primary_key);
        assert_eq!(columns[1].column_type, "string");
        assert_eq!(columns[2].column_type, "string");
        assert!(!columns[2].is_nullable);
        assert!(columns[3].is_nullable);
        assert!(columns.iter().all(|column| !column.is_foreign_key));
        assert_eq!(columns[1].display_name, "email");
        assert_eq!(schema.schema, Some(json!({"engine": "pg"})));
    }

    #[test]
    fn schema_without_columns_or_primary_key_list() {
        let schema = normalize_schema("logs", &json!({"columns": "n/a", "primaryKey": "id"}))
            .expect("object schema");
        assert_eq!(schema.table_name, "logs");
        assert!(schema.columns.is_none());
        assert!(!schema.has_primary_key());

        assert!(matches!(
            normalize_schema("logs", &json!([1, 2])),
            Err(ApiError::Decode { .. })
        ));
    }

    #[test]
    fn record_envelopes_normalize_identically() {
        let wrapped = normalize_records("t", json!({"records": [{"a": 1}]}));
        let bare = normalize_records("t", json!([{"a": 1}]));
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.len(), 1);

        assert!(normalize_records("t", json!({"rows": [{"a": 1}]})).is_empty());
        assert!(normalize_records("t", json!({"records": "x"})).is_empty());
        assert!(normalize_records("t", json!("text")).is_empty());
        assert_eq!(normalize_records("t", json!([{"a": 1}, 7, null])).len(), 1);
    }

    #[test]
    fn single_record_shapes() {
        assert_eq!(
            unwrap_record(json!({"record": {"id": 1}})).expect("nested"),
            json!({"id": 1}).as_object().cloned().expect("object")
        );
        assert_eq!(
            unwrap_record(json!({"id": 2, "error": ""})).expect("empty error is ignored"),
            json!({"id": 2, "error": ""}).as_object().cloned().expect("object")
        );
        assert_eq!(
            unwrap_record(json!({"error": "row locked"})),
            Err(ApiError::Malformed {
                message: "row locked".to_owned()
            })
        );
        assert!(matches!(
            unwrap_record(json!([{"id": 1}])),
            Err(ApiError::Malformed { .. })
        ));
    }

    #[test]
    fn empty_write_body_returns_sent_payload() {
        let sent = json!({"id": 4}).as_object().cloned().expect("object");
        assert_eq!(unwrap_write("  ", sent.clone()), Ok(sent));
    }

    #[test]
    fn client_rejects_unusable_base_urls() {
        for raw in ["", "ftp://host/api", "mailto:someone@example.com", "not a url"] {
            assert!(
                matches!(
                    Client::new(raw, Duration::from_secs(1)),
                    Err(ApiError::InvalidBaseUrl { .. })
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn endpoints_percent_encode_segments() {
        let client =
            Client::new("http://example.test/api/", Duration::from_secs(1)).expect("valid URL");
        let url = client
            .endpoint(&["tables", "my table", "records", "a/b"])
            .expect("base URL accepts paths");
        assert_eq!(
            url.as_str(),
            "http://example.test/api/tables/my%20table/records/a%2Fb"
        );
    }

    #[test]
    fn precondition_classification() {
        let missing = ApiError::PreconditionFailed {
            action: super::WriteAction::Delete,
            table: "events".to_owned(),
        };
        assert!(missing.is_precondition());
        assert_eq!(
            missing.to_string(),
            "Cannot delete record: Table events does not have a primary key"
        );
        assert!(
            !ApiError::Http {
                status: 500,
                message: "x".to_owned()
            }
            .is_precondition()
        );
    }
}
