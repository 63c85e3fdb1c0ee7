// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tabex_api::{ApiError, Client};
use tabex_app::{Record, RecordId, SavePayload, TableMetadata, TableSchema};
use tracing::{error, info, warn};

/// Binds the HTTP client to the TUI. Every failure is logged before it is
/// handed back for display.
pub struct ApiRuntime {
    client: Client,
}

impl ApiRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn logged<T>(operation: &str, table: &str, result: Result<T, ApiError>) -> Result<T> {
    result.map_err(|failure| {
        if failure.is_precondition() {
            warn!(operation, table, error = %failure, "write refused");
        } else {
            error!(operation, table, error = %failure, "api call failed");
        }
        failure.into()
    })
}

fn warn_fallbacks(table: &str, payload: &SavePayload) {
    for field in &payload.coercion_fallbacks {
        warn!(table, field = %field, "numeric field is not a number; sending it as text");
    }
}

impl tabex_tui::AppRuntime for ApiRuntime {
    fn list_tables(&mut self) -> Result<Vec<TableMetadata>> {
        logged("list_tables", "", self.client.list_tables())
    }

    fn load_schema(&mut self, table: &str) -> Result<TableSchema> {
        logged("get_schema", table, self.client.get_schema(table))
    }

    fn list_records(&mut self, table: &str) -> Result<Vec<Record>> {
        logged("list_records", table, self.client.list_records(table))
    }

    fn load_record(&mut self, table: &str, id: &RecordId) -> Result<Record> {
        logged("get_record", table, self.client.get_record(table, id))
    }

    fn create_record(&mut self, table: &str, payload: &SavePayload) -> Result<Record> {
        warn_fallbacks(table, payload);
        let saved = logged(
            "create_record",
            table,
            self.client.create_record(table, &payload.data),
        )?;
        info!(table, "record created");
        Ok(saved)
    }

    fn update_record(
        &mut self,
        table: &str,
        id: &RecordId,
        payload: &SavePayload,
    ) -> Result<Record> {
        warn_fallbacks(table, payload);
        let saved = logged(
            "update_record",
            table,
            self.client.update_record(table, id, &payload.data),
        )?;
        info!(table, id = %id, "record updated");
        Ok(saved)
    }

    fn delete_record(&mut self, table: &str, id: &RecordId) -> Result<()> {
        logged("delete_record", table, self.client.delete_record(table, id))?;
        info!(table, id = %id, "record deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ApiRuntime;
    use anyhow::Result;
    use serde_json::json;
    use std::time::Duration;
    use tabex_api::Client;
    use tabex_app::{RecordId, SavePayload};
    use tabex_testkit::{MockApi, MockReply, events_schema_json, record, users_schema_json};
    use tabex_tui::AppRuntime;

    fn runtime_for(api: &MockApi) -> Result<ApiRuntime> {
        Ok(ApiRuntime::new(Client::new(
            api.base_url(),
            Duration::from_secs(2),
        )?))
    }

    #[test]
    fn update_goes_through_client_with_injected_key() -> Result<()> {
        let api = MockApi::start(vec![
            MockReply::json(200, users_schema_json()),
            MockReply::json(200, json!({"record": {"id": 7, "email": "a@b.com"}})),
        ])?;
        let mut runtime = runtime_for(&api)?;

        let payload = SavePayload {
            data: record(json!({"email": "a@b.com"})),
            coercion_fallbacks: Vec::new(),
        };
        let saved = runtime.update_record("users", &RecordId::from(7), &payload)?;
        assert_eq!(saved.get("email"), Some(&json!("a@b.com")));

        let requests = api.requests();
        assert_eq!(
            api.request_lines(),
            vec![
                "GET /api/tables/users".to_owned(),
                "PUT /api/tables/users/records/7".to_owned(),
            ]
        );
        assert_eq!(requests[1].body, Some(json!({"email": "a@b.com", "id": 7})));
        Ok(())
    }

    #[test]
    fn precondition_failure_surfaces_message() -> Result<()> {
        let api = MockApi::start(vec![MockReply::json(200, events_schema_json())])?;
        let mut runtime = runtime_for(&api)?;

        let error = runtime
            .delete_record("events", &RecordId::from(1))
            .expect_err("delete without primary key should fail");
        assert_eq!(
            error.to_string(),
            "Cannot delete record: Table events does not have a primary key"
        );
        assert_eq!(api.request_lines(), vec!["GET /api/tables/events".to_owned()]);
        Ok(())
    }

    #[test]
    fn list_failures_become_errors() -> Result<()> {
        let api = MockApi::start(vec![MockReply::json(401, json!({"error": "login"}))])?;
        let mut runtime = runtime_for(&api)?;
        let error = runtime
            .list_records("users")
            .expect_err("401 should fail");
        assert!(error.to_string().contains("users"));
        Ok(())
    }
}
