// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Shared test fixtures: a scripted REST server and sample tables.

use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tabex_app::{ColumnMetadata, Record, TableMetadata, TableSchema};
use tiny_http::{Header, Response, Server};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const BASE_PATH: &str = "/api";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::text(status, "")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: Option<Value>,
}

/// A local HTTP server that answers requests from a fixed script, in order,
/// and remembers what it was asked. Unscripted requests get a 500.
pub struct MockApi {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockApi {
    pub fn start(replies: Vec<MockReply>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let base_url = format!("http://{}{BASE_PATH}", server.server_addr());

        let requests = Arc::new(Mutex::new(Vec::new()));
        let replies = Arc::new(Mutex::new(VecDeque::from(replies)));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let requests = Arc::clone(&requests);
            let replies = Arc::clone(&replies);
            let stop = Arc::clone(&stop);
            thread::spawn(move || serve(&server, &requests, &replies, &stop))
        };

        Ok(Self {
            base_url,
            requests,
            replies,
            stop,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// `"METHOD /path"` for each request, in arrival order.
    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| format!("{} {}", request.method, request.url))
            .collect()
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.lock().map(|replies| replies.len()).unwrap_or(0)
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(
    server: &Server,
    requests: &Mutex<Vec<RecordedRequest>>,
    replies: &Mutex<VecDeque<MockReply>>,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::SeqCst) {
        let mut request = match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(_) => break,
        };

        let mut raw = String::new();
        let body = match request.as_reader().read_to_string(&mut raw) {
            Ok(_) if !raw.is_empty() => serde_json::from_str(&raw).ok(),
            _ => None,
        };
        if let Ok(mut requests) = requests.lock() {
            requests.push(RecordedRequest {
                method: request.method().to_string(),
                url: request.url().to_owned(),
                body,
            });
        }

        let reply = replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| MockReply::json(500, json!({"error": "no scripted reply"})));

        let mut response = Response::from_string(reply.body).with_status_code(reply.status);
        if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
            response = response.with_header(header);
        }
        let _ = request.respond(response);
    }
}

/// Raw `GET /tables/users` body: `id` integer primary key, `email` required.
pub fn users_schema_json() -> Value {
    json!({
        "name": "users",
        "columns": [
            {"name": "id", "type": "integer", "nullable": false},
            {"name": "email", "type": "string", "nullable": false},
            {"name": "nickname", "type": "varchar", "nullable": true},
            {"name": "active", "type": "boolean", "nullable": true},
            {"name": "joined", "type": "date", "nullable": true}
        ],
        "primaryKey": ["id"]
    })
}

/// Raw schema body for an append-only table with no primary key.
pub fn events_schema_json() -> Value {
    json!({
        "name": "events",
        "columns": [
            {"name": "name", "type": "string", "nullable": false},
            {"name": "payload", "type": "json", "nullable": true}
        ],
        "primaryKey": []
    })
}

pub fn users_schema() -> TableSchema {
    let column = |name: &str, column_type: &str, pk: bool, nullable: bool| ColumnMetadata {
        name: name.to_owned(),
        display_name: name.to_owned(),
        column_type: column_type.to_owned(),
        is_primary_key: pk,
        is_foreign_key: false,
        is_nullable: nullable,
    };
    TableSchema {
        table_name: "users".to_owned(),
        columns: Some(vec![
            column("id", "integer", true, false),
            column("email", "string", false, false),
            column("nickname", "varchar", false, true),
            column("active", "boolean", false, true),
            column("joined", "date", false, true),
        ]),
        schema: None,
    }
}

pub fn events_schema() -> TableSchema {
    TableSchema {
        table_name: "events".to_owned(),
        columns: Some(vec![
            ColumnMetadata {
                name: "name".to_owned(),
                display_name: "name".to_owned(),
                column_type: "string".to_owned(),
                is_primary_key: false,
                is_foreign_key: false,
                is_nullable: false,
            },
            ColumnMetadata {
                name: "payload".to_owned(),
                display_name: "payload".to_owned(),
                column_type: "json".to_owned(),
                is_primary_key: false,
                is_foreign_key: false,
                is_nullable: true,
            },
        ]),
        schema: None,
    }
}

pub fn user_record(id: i64, email: &str) -> Record {
    record(json!({
        "id": id,
        "email": email,
        "nickname": null,
        "active": true,
        "joined": "2024-01-15"
    }))
}

pub fn sample_users() -> Vec<Record> {
    vec![
        user_record(1, "ada@example.com"),
        user_record(2, "grace@example.com"),
        user_record(3, "linus@example.com"),
    ]
}

pub fn sample_tables() -> Vec<TableMetadata> {
    vec![
        TableMetadata {
            name: "users".to_owned(),
            display_name: Some("Users".to_owned()),
            description: Some("Registered accounts".to_owned()),
            record_count: Some(1204),
            last_updated: Some("2024-01-15T14:05:09Z".to_owned()),
            table_type: None,
        },
        TableMetadata {
            name: "events".to_owned(),
            table_type: Some("view".to_owned()),
            ..TableMetadata::default()
        },
    ]
}

/// Converts an object literal into a [`Record`]; anything else becomes empty.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
