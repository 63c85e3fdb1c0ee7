// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use std::ops::Range;

use crate::{Record, TableMetadata, TableSchema, format_value, plain_text};

pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Columns shown when the grid has to guess them from the first record.
pub const INFERRED_COLUMN_CAP: usize = 5;
/// Non-key schema columns shown next to the primary key.
pub const SCHEMA_EXTRA_COLUMNS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridColumn {
    pub name: String,
    pub header: String,
    pub column_type: Option<String>,
}

pub fn grid_columns(schema: Option<&TableSchema>, records: &[Record]) -> Vec<GridColumn> {
    let Some(columns) = schema.and_then(|schema| schema.columns.as_deref()) else {
        return records
            .first()
            .map(|first| {
                first
                    .keys()
                    .take(INFERRED_COLUMN_CAP)
                    .map(|key| GridColumn {
                        name: key.clone(),
                        header: key.clone(),
                        column_type: None,
                    })
                    .collect()
            })
            .unwrap_or_default();
    };

    let primary = columns.iter().find(|column| column.is_primary_key);
    primary
        .into_iter()
        .chain(
            columns
                .iter()
                .filter(|column| !column.is_primary_key)
                .take(SCHEMA_EXTRA_COLUMNS),
        )
        .map(|column| GridColumn {
            name: column.name.clone(),
            header: if column.display_name.is_empty() {
                column.name.clone()
            } else {
                column.display_name.clone()
            },
            column_type: Some(column.column_type.clone()),
        })
        .collect()
}

pub fn grid_cell(record: &Record, column: &GridColumn) -> String {
    let value = record.get(&column.name).unwrap_or(&Value::Null);
    match &column.column_type {
        Some(column_type) => format_value(value, column_type),
        None => match value {
            Value::Null => "-".to_owned(),
            other => plain_text(other),
        },
    }
}

pub fn record_matches(record: &Record, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    record
        .values()
        .any(|value| plain_text(value).to_lowercase().contains(&needle))
}

pub fn table_matches(table: &TableMetadata, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let record_count = table.record_count.map(|count| count.to_string());
    [
        Some(table.name.as_str()),
        table.display_name.as_deref(),
        table.description.as_deref(),
        table.table_type.as_deref(),
        table.last_updated.as_deref(),
        record_count.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

pub fn filter_records<'a>(records: &'a [Record], query: &str) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| record_matches(record, query))
        .collect()
}

pub fn filter_tables<'a>(tables: &'a [TableMetadata], query: &str) -> Vec<&'a TableMetadata> {
    tables
        .iter()
        .filter(|table| table_matches(table, query))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page_size: usize,
    page: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page: 0,
        }
    }

    pub const fn page(&self) -> usize {
        self.page
    }

    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    pub fn clamp(&mut self, total: usize) {
        self.page = self.page.min(self.page_count(total) - 1);
    }

    pub fn reset(&mut self) {
        self.page = 0;
    }

    pub fn next(&mut self, total: usize) -> bool {
        if self.page + 1 < self.page_count(total) {
            self.page += 1;
            return true;
        }
        false
    }

    pub fn prev(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            return true;
        }
        false
    }

    pub fn range(&self, total: usize) -> Range<usize> {
        let start = (self.page * self.page_size).min(total);
        let end = (start + self.page_size).min(total);
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.range(items.len())]
    }

    pub fn label(&self, total: usize) -> String {
        format!("page {}/{}", self.page + 1, self.page_count(total))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        GridColumn, Pager, filter_records, filter_tables, grid_cell, grid_columns, record_matches,
    };
    use crate::{ColumnMetadata, Record, TableMetadata, TableSchema};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().expect("object literal")
    }

    fn column(name: &str, column_type: &str, pk: bool) -> ColumnMetadata {
        ColumnMetadata {
            name: name.to_owned(),
            display_name: name.to_owned(),
            column_type: column_type.to_owned(),
            is_primary_key: pk,
            is_foreign_key: false,
            is_nullable: true,
        }
    }

    #[test]
    fn schema_grid_puts_primary_key_first_and_caps_extras() {
        let schema = TableSchema {
            table_name: "wide".to_owned(),
            columns: Some(vec![
                column("a", "text", false),
                column("b", "text", false),
                column("id", "integer", true),
                column("c", "text", false),
                column("d", "text", false),
                column("e", "text", false),
            ]),
            schema: None,
        };
        let names: Vec<String> = grid_columns(Some(&schema), &[])
            .into_iter()
            .map(|column| column.name)
            .collect();
        assert_eq!(names, vec!["id", "a", "b", "c", "d"]);
    }

    #[test]
    fn inferred_grid_uses_first_five_keys_of_first_record() {
        let rows = vec![record(
            json!({"k1": 1, "k2": 2, "k3": 3, "k4": 4, "k5": 5, "k6": 6}),
        )];
        let columns = grid_columns(None, &rows);
        assert_eq!(columns.len(), 5);
        assert_eq!(columns[0].name, "k1");
        assert_eq!(columns[4].name, "k5");
        assert!(columns.iter().all(|column| column.column_type.is_none()));
        assert!(grid_columns(None, &[]).is_empty());
    }

    #[test]
    fn inferred_cells_mark_null_and_serialize_objects() {
        let row = record(json!({"a": null, "b": {"x": 1}, "c": "text"}));
        let cell = |name: &str| {
            grid_cell(
                &row,
                &GridColumn {
                    name: name.to_owned(),
                    header: name.to_owned(),
                    column_type: None,
                },
            )
        };
        assert_eq!(cell("a"), "-");
        assert_eq!(cell("b"), r#"{"x":1}"#);
        assert_eq!(cell("c"), "text");
        assert_eq!(cell("missing"), "-");
    }

    #[test]
    fn typed_cells_use_the_formatter() {
        let row = record(json!({"total": 12500}));
        let total = GridColumn {
            name: "total".to_owned(),
            header: "Total".to_owned(),
            column_type: Some("integer".to_owned()),
        };
        assert_eq!(grid_cell(&row, &total), "12,500");
    }

    #[test]
    fn record_filter_is_case_insensitive_substring() {
        let rows = vec![
            record(json!({"id": 1, "email": "Ada@Example.com"})),
            record(json!({"id": 2, "email": "bob@example.com"})),
        ];
        assert_eq!(filter_records(&rows, "ADA").len(), 1);
        assert_eq!(filter_records(&rows, "example").len(), 2);
        assert_eq!(filter_records(&rows, "").len(), 2);
        assert!(record_matches(&rows[1], "2"));
    }

    #[test]
    fn table_filter_checks_metadata_fields() {
        let mut users = TableMetadata::named("users");
        users.description = Some("Registered accounts".to_owned());
        let orders = TableMetadata::named("orders");
        let tables = vec![users, orders];
        assert_eq!(filter_tables(&tables, "accounts").len(), 1);
        assert_eq!(filter_tables(&tables, "ORD").len(), 1);
        assert_eq!(filter_tables(&tables, "  ").len(), 2);
    }

    #[test]
    fn pager_walks_and_clamps_pages() {
        let items: Vec<usize> = (0..23).collect();
        let mut pager = Pager::new(10);
        assert_eq!(pager.page_count(items.len()), 3);
        assert_eq!(pager.slice(&items), &items[0..10]);
        assert!(pager.next(items.len()));
        assert!(pager.next(items.len()));
        assert!(!pager.next(items.len()));
        assert_eq!(pager.slice(&items), &items[20..23]);
        assert_eq!(pager.label(items.len()), "page 3/3");

        pager.clamp(5);
        assert_eq!(pager.page(), 0);
        assert!(!pager.prev());
        assert_eq!(Pager::new(10).page_count(0), 1);
    }
}
