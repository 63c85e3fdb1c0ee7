// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use serde_json::Value;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tabex_app::{
    AppCommand, AppState, DEFAULT_ID_FIELD, DetailTarget, EditableField, FieldKind, FormError,
    GridColumn, Pager, Record, RecordForm, RecordId, SAVED_STATUS, SavePayload, Screen,
    ScreenKind, TableMetadata, TableSchema, filter_records, filter_tables, format_count,
    format_date_time, grid_cell, grid_columns, parse_date_time,
};
use time::{Date, Month, OffsetDateTime};

const NULL_MARKER: &str = "NULL";
const EMPTY_CELL: &str = "-";
const DEFAULT_TABLE_TYPE: &str = "table";
const TABLE_HEADERS: [&str; 5] = ["Name", "Type", "Description", "Records", "Last Updated"];
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const UNADDRESSABLE_STATUS: &str = "Record has no primary key value; it cannot be edited";
const NO_PRIMARY_KEY_NOTICE: &str = "Table has no primary key: viewing details, creating, or deleting records may not be available.";

/// Everything the UI needs from the outside world. Calls block the UI loop
/// until they return.
pub trait AppRuntime {
    fn list_tables(&mut self) -> Result<Vec<TableMetadata>>;
    fn load_schema(&mut self, table: &str) -> Result<TableSchema>;
    fn list_records(&mut self, table: &str) -> Result<Vec<Record>>;
    fn load_record(&mut self, table: &str, id: &RecordId) -> Result<Record>;
    fn create_record(&mut self, table: &str, payload: &SavePayload) -> Result<Record>;
    fn update_record(&mut self, table: &str, id: &RecordId, payload: &SavePayload)
    -> Result<Record>;
    fn delete_record(&mut self, table: &str, id: &RecordId) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ListUiState {
    filter: String,
    filter_editing: bool,
    selected: usize,
    pager: Pager,
}

impl ListUiState {
    fn new(page_size: usize) -> Self {
        Self {
            pager: Pager::new(page_size),
            ..Self::default()
        }
    }

    fn reset(&mut self) {
        self.pager.reset();
        self.selected = 0;
    }

    fn clamp(&mut self, total: usize) {
        self.pager.clamp(total);
        let visible = self.pager.range(total).len();
        self.selected = self.selected.min(visible.saturating_sub(1));
    }

    fn move_selection(&mut self, delta: isize, total: usize) {
        let visible = self.pager.range(total).len();
        if visible == 0 {
            self.selected = 0;
            return;
        }
        let next = (self.selected as isize + delta).clamp(0, visible as isize - 1);
        self.selected = next as usize;
    }

    fn selected_index(&self, total: usize) -> Option<usize> {
        let range = self.pager.range(total);
        let index = range.start + self.selected;
        (index < range.end).then_some(index)
    }

    fn title_suffix(&self, total: usize) -> String {
        let mut suffix = format!("({total}) {}", self.pager.label(total));
        if self.filter_editing || !self.filter.is_empty() {
            let cursor = if self.filter_editing { "_" } else { "" };
            suffix.push_str(&format!(" | find: {}{cursor}", self.filter));
        }
        suffix
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct TablesView {
    tables: Vec<TableMetadata>,
    error: Option<String>,
    list: ListUiState,
}

impl TablesView {
    fn filtered(&self) -> Vec<&TableMetadata> {
        filter_tables(&self.tables, &self.list.filter)
    }

    fn selected(&self) -> Option<&TableMetadata> {
        let filtered = self.filtered();
        self.list
            .selected_index(filtered.len())
            .and_then(|index| filtered.get(index).copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RecordsView {
    table: String,
    schema: Option<TableSchema>,
    records: Vec<Record>,
    error: Option<String>,
    list: ListUiState,
}

impl RecordsView {
    fn new(table: String, page_size: usize) -> Self {
        Self {
            table,
            schema: None,
            records: Vec::new(),
            error: None,
            list: ListUiState::new(page_size),
        }
    }

    fn has_primary_key(&self) -> bool {
        self.schema
            .as_ref()
            .is_some_and(TableSchema::has_primary_key)
    }

    fn id_field(&self) -> &str {
        self.schema
            .as_ref()
            .map_or(DEFAULT_ID_FIELD, TableSchema::id_field)
    }

    fn filtered(&self) -> Vec<&Record> {
        filter_records(&self.records, &self.list.filter)
    }

    fn selected(&self) -> Option<&Record> {
        let filtered = self.filtered();
        self.list
            .selected_index(filtered.len())
            .and_then(|index| filtered.get(index).copied())
    }

    fn columns(&self) -> Vec<GridColumn> {
        grid_columns(self.schema.as_ref(), &self.records)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
struct DetailView {
    schema: Option<TableSchema>,
    loaded: Option<Record>,
    form: Option<RecordForm>,
    error: Option<String>,
    field_index: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct DatePickerUiState {
    visible: bool,
    field: String,
    original: Option<Date>,
    selected: Option<Date>,
}

#[derive(Debug, Clone, PartialEq)]
struct ViewData {
    page_size: usize,
    tables: TablesView,
    records: Option<RecordsView>,
    detail: DetailView,
    date_picker: DatePickerUiState,
    pending_delete: Option<RecordId>,
    help_visible: bool,
    status_token: u64,
}

impl ViewData {
    fn new(page_size: usize) -> Self {
        Self {
            page_size,
            tables: TablesView {
                list: ListUiState::new(page_size),
                ..TablesView::default()
            },
            records: None,
            detail: DetailView::default(),
            date_picker: DatePickerUiState::default(),
            pending_delete: None,
            help_visible: false,
            status_token: 0,
        }
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    page_size: usize,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(page_size);
    let (internal_tx, internal_rx) = mpsc::channel();
    load_tables(runtime, &mut view_data);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    if view_data.pending_delete.is_some() {
        handle_delete_confirm_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.date_picker.visible {
        handle_date_picker_key(state, view_data, internal_tx, key);
        return false;
    }

    let kind = state.screen.kind();
    if active_list(kind, view_data).is_some_and(|list| list.filter_editing) {
        handle_filter_key(kind, view_data, key);
        return false;
    }

    if state.screen.is_editing() {
        handle_form_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if key.code == KeyCode::Char('?') {
        view_data.help_visible = true;
        return false;
    }

    let status = match kind {
        ScreenKind::Tables => handle_tables_key(state, runtime, view_data, key),
        ScreenKind::Records => handle_records_key(state, runtime, view_data, key),
        ScreenKind::RecordDetail => handle_detail_key(state, runtime, view_data, key),
    };
    if let Some(status) = status {
        emit_status(state, view_data, internal_tx, status);
    }
    false
}

fn active_list(kind: ScreenKind, view_data: &ViewData) -> Option<&ListUiState> {
    match kind {
        ScreenKind::Tables => Some(&view_data.tables.list),
        ScreenKind::Records => view_data.records.as_ref().map(|records| &records.list),
        ScreenKind::RecordDetail => None,
    }
}

fn active_list_mut(kind: ScreenKind, view_data: &mut ViewData) -> Option<&mut ListUiState> {
    match kind {
        ScreenKind::Tables => Some(&mut view_data.tables.list),
        ScreenKind::Records => view_data.records.as_mut().map(|records| &mut records.list),
        ScreenKind::RecordDetail => None,
    }
}

fn handle_filter_key(kind: ScreenKind, view_data: &mut ViewData, key: KeyEvent) {
    let Some(list) = active_list_mut(kind, view_data) else {
        return;
    };
    match key.code {
        KeyCode::Esc => {
            list.filter.clear();
            list.filter_editing = false;
            list.reset();
        }
        KeyCode::Enter => list.filter_editing = false,
        KeyCode::Backspace => {
            list.filter.pop();
            list.reset();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            list.filter.push(ch);
            list.reset();
        }
        _ => {}
    }
}

/// Movement, paging and the filter prompt, shared by both list screens.
fn handle_list_nav(list: &mut ListUiState, key: KeyEvent, total: usize) -> bool {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => list.move_selection(1, total),
        KeyCode::Char('k') | KeyCode::Up => list.move_selection(-1, total),
        KeyCode::Char('l') | KeyCode::Right | KeyCode::PageDown => {
            if list.pager.next(total) {
                list.selected = 0;
            }
        }
        KeyCode::Char('h') | KeyCode::Left | KeyCode::PageUp => {
            if list.pager.prev() {
                list.selected = 0;
            }
        }
        KeyCode::Char('/') => list.filter_editing = true,
        _ => return false,
    }
    true
}

fn handle_tables_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> Option<String> {
    let total = view_data.tables.filtered().len();
    if handle_list_nav(&mut view_data.tables.list, key, total) {
        return None;
    }

    match key.code {
        KeyCode::Char('r') => {
            load_tables(runtime, view_data);
            Some(match &view_data.tables.error {
                Some(_) => "refresh failed".to_owned(),
                None => format!("{} tables", view_data.tables.tables.len()),
            })
        }
        KeyCode::Enter => {
            let Some(name) = view_data.tables.selected().map(|table| table.name.clone()) else {
                return Some("no table selected".to_owned());
            };
            state.dispatch(AppCommand::SelectTable(name.clone()));
            let mut records = RecordsView::new(name, view_data.page_size);
            load_records(runtime, &mut records);
            view_data.records = Some(records);
            None
        }
        _ => None,
    }
}

fn handle_records_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> Option<String> {
    let records = view_data.records.as_mut()?;
    let total = records.filtered().len();
    if handle_list_nav(&mut records.list, key, total) {
        return None;
    }

    match key.code {
        KeyCode::Esc | KeyCode::Backspace => {
            state.dispatch(AppCommand::Back);
            view_data.records = None;
            None
        }
        KeyCode::Char('r') => {
            load_records(runtime, records);
            Some(match &records.error {
                Some(_) => "refresh failed".to_owned(),
                None => format!("{} records", records.records.len()),
            })
        }
        KeyCode::Enter => {
            let Some(record) = records.selected().cloned() else {
                return Some("no record selected".to_owned());
            };
            state.dispatch(AppCommand::SelectRecord(record));
            load_detail(state, runtime, view_data);
            None
        }
        KeyCode::Char('a') => {
            if !records.has_primary_key() {
                return Some("Table must have a primary key to create records".to_owned());
            }
            state.dispatch(AppCommand::CreateRecord);
            load_detail(state, runtime, view_data);
            None
        }
        KeyCode::Char('d') => {
            if !records.has_primary_key() {
                return Some("Table must have a primary key to delete records".to_owned());
            }
            let id_field = records.id_field().to_owned();
            let id = records
                .selected()
                .map(|record| RecordId::new(record.get(&id_field).cloned().unwrap_or(Value::Null)))
                .filter(|id| !id.is_missing());
            match id {
                Some(id) => {
                    view_data.pending_delete = Some(id);
                    None
                }
                None => Some("no record selected".to_owned()),
            }
        }
        _ => None,
    }
}

fn handle_delete_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            let Some(id) = view_data.pending_delete.take() else {
                return;
            };
            let status = delete_selected(runtime, view_data, &id);
            emit_status(state, view_data, internal_tx, status);
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            view_data.pending_delete = None;
            emit_status(state, view_data, internal_tx, "delete canceled");
        }
        _ => {}
    }
}

fn delete_selected<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    id: &RecordId,
) -> String {
    let Some(records) = view_data.records.as_mut() else {
        return "no table open".to_owned();
    };
    match runtime.delete_record(&records.table, id) {
        Ok(()) => {
            let id_field = records.id_field().to_owned();
            records
                .records
                .retain(|record| record.get(&id_field) != Some(id.value()));
            records.error = None;
            let total = records.filtered().len();
            records.list.clamp(total);
            "Record deleted.".to_owned()
        }
        Err(error) => {
            records.error = Some(format!("Failed to delete record: {error:#}"));
            "delete failed".to_owned()
        }
    }
}

fn handle_detail_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    key: KeyEvent,
) -> Option<String> {
    match key.code {
        KeyCode::Esc | KeyCode::Backspace => {
            back_to_records(state, runtime, view_data);
            None
        }
        KeyCode::Char('e') => {
            let form = view_data.detail.form.as_ref()?;
            if !form.is_addressable() {
                return Some(UNADDRESSABLE_STATUS.to_owned());
            }
            let first_editable = form
                .fields()
                .iter()
                .position(|field| !form.is_read_only(&field.name))
                .unwrap_or(0);
            view_data.detail.field_index = first_editable;
            state.dispatch(AppCommand::ToggleEdit);
            None
        }
        KeyCode::Char('j') | KeyCode::Down => {
            move_field(view_data, 1);
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            move_field(view_data, -1);
            None
        }
        KeyCode::Char('r') => {
            load_detail(state, runtime, view_data);
            None
        }
        _ => None,
    }
}

fn back_to_records<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) {
    state.dispatch(AppCommand::Back);
    view_data.detail = DetailView::default();
    view_data.date_picker = DatePickerUiState::default();
    if let Some(records) = view_data.records.as_mut() {
        load_records(runtime, records);
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
        save_form(state, runtime, view_data, internal_tx);
        return;
    }

    match key.code {
        KeyCode::Esc => cancel_edit(state, runtime, view_data, internal_tx),
        KeyCode::Up | KeyCode::BackTab => move_field(view_data, -1),
        KeyCode::Down | KeyCode::Tab => move_field(view_data, 1),
        KeyCode::Enter if selected_field(view_data).is_some_and(is_pickable_date) => {
            if let Some(field) = selected_field(view_data).cloned() {
                open_date_picker(state, view_data, internal_tx, &field);
            }
        }
        _ => {
            if let Some(status) = edit_selected_field(view_data, key) {
                emit_status(state, view_data, internal_tx, status);
            }
        }
    }
}

fn selected_field(view_data: &ViewData) -> Option<&EditableField> {
    view_data
        .detail
        .form
        .as_ref()
        .and_then(|form| form.fields().get(view_data.detail.field_index))
}

fn is_pickable_date(field: &EditableField) -> bool {
    field.kind == FieldKind::Date
}

fn move_field(view_data: &mut ViewData, delta: isize) {
    let count = view_data
        .detail
        .form
        .as_ref()
        .map_or(0, |form| form.fields().len());
    if count == 0 {
        view_data.detail.field_index = 0;
        return;
    }
    let next = (view_data.detail.field_index as isize + delta).rem_euclid(count as isize);
    view_data.detail.field_index = next as usize;
}

fn edit_selected_field(view_data: &mut ViewData, key: KeyEvent) -> Option<String> {
    let index = view_data.detail.field_index;
    let form = view_data.detail.form.as_mut()?;
    let field = form.fields().get(index)?.clone();

    let edits = matches!(
        key.code,
        KeyCode::Char(_) | KeyCode::Backspace | KeyCode::Enter
    );
    if form.is_read_only(&field.name) {
        return edits.then(|| format!("{} is read-only", field.name));
    }

    let result = match (field.kind, key.code) {
        (FieldKind::Boolean, KeyCode::Char(' ') | KeyCode::Enter) => {
            form.toggle(&field.name).map(|_| ())
        }
        (FieldKind::Boolean, _) => return None,
        (FieldKind::LongText, KeyCode::Enter) => {
            let mut text = field.input_text();
            text.push('\n');
            form.set_text(&field.name, text)
        }
        (kind, KeyCode::Char(ch)) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if kind == FieldKind::Number && !is_numeric_input(ch) {
                return Some(format!("{} takes a number", field.name));
            }
            let mut text = field.input_text();
            text.push(ch);
            form.set_text(&field.name, text)
        }
        (_, KeyCode::Backspace) => {
            let mut text = field.input_text();
            text.pop();
            form.set_text(&field.name, text)
        }
        _ => return None,
    };
    result.err().map(|error| error.to_string())
}

fn is_numeric_input(ch: char) -> bool {
    ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.' | 'e' | 'E')
}

fn cancel_edit<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let is_new = view_data
        .detail
        .form
        .as_ref()
        .is_none_or(RecordForm::is_new);
    if is_new {
        back_to_records(state, runtime, view_data);
        emit_status(state, view_data, internal_tx, "create canceled");
        return;
    }

    let table = state.screen.table().unwrap_or_default().to_owned();
    if let Some(loaded) = &view_data.detail.loaded {
        view_data.detail.form = Some(RecordForm::for_existing(
            &table,
            view_data.detail.schema.as_ref(),
            loaded,
        ));
    }
    state.dispatch(AppCommand::ToggleEdit);
    emit_status(state, view_data, internal_tx, "edit canceled");
}

fn save_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.detail.form.as_mut() else {
        return;
    };
    if !form.is_addressable() {
        emit_status(state, view_data, internal_tx, UNADDRESSABLE_STATUS);
        return;
    }
    let payload = match form.prepare_save() {
        Ok(payload) => payload,
        Err(FormError::ValidationFailed(fields)) => {
            let message = format!("fix required fields: {}", fields.join(", "));
            emit_status(state, view_data, internal_tx, message);
            return;
        }
        Err(error) => {
            emit_status(state, view_data, internal_tx, error.to_string());
            return;
        }
    };

    let table = form.table().to_owned();
    let saved = match form.record_id().cloned() {
        None => runtime.create_record(&table, &payload),
        Some(id) => runtime.update_record(&table, &id, &payload),
    };

    match saved {
        Ok(saved) => {
            view_data.detail.form = Some(RecordForm::for_existing(
                &table,
                view_data.detail.schema.as_ref(),
                &saved,
            ));
            view_data.detail.loaded = Some(saved.clone());
            view_data.detail.error = None;
            state.dispatch(AppCommand::RecordSaved(saved));

            let status = if payload.coercion_fallbacks.is_empty() {
                SAVED_STATUS.to_owned()
            } else {
                format!(
                    "{SAVED_STATUS} Sent as text, not a number: {}",
                    payload.coercion_fallbacks.join(", ")
                )
            };
            emit_status(state, view_data, internal_tx, status);
        }
        Err(error) => {
            view_data.detail.error = Some(format!("Failed to save record: {error:#}"));
            emit_status(state, view_data, internal_tx, "save failed");
        }
    }
}

fn open_date_picker(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    field: &EditableField,
) {
    if view_data
        .detail
        .form
        .as_ref()
        .is_some_and(|form| form.is_read_only(&field.name))
    {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("{} is read-only", field.name),
        );
        return;
    }

    let original = parse_date_time(&field.input_text()).map(|parsed| parsed.date());
    view_data.date_picker = DatePickerUiState {
        visible: true,
        field: field.name.clone(),
        original,
        selected: Some(original.unwrap_or_else(|| OffsetDateTime::now_utc().date())),
    };
}

fn handle_date_picker_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(current) = view_data.date_picker.selected else {
        view_data.date_picker = DatePickerUiState::default();
        return;
    };

    let next = match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            view_data.date_picker = DatePickerUiState::default();
            emit_status(state, view_data, internal_tx, "date edit canceled");
            return;
        }
        (KeyCode::Enter, _) => {
            let field = std::mem::take(&mut view_data.date_picker).field;
            let result = view_data
                .detail
                .form
                .as_mut()
                .map(|form| form.set_text(&field, current.to_string()));
            let status = match result {
                Some(Err(error)) => error.to_string(),
                _ => format!("{field} set to {current}"),
            };
            emit_status(state, view_data, internal_tx, status);
            return;
        }
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => shift_date_by_days(current, -1),
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => shift_date_by_days(current, 1),
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => shift_date_by_days(current, 7),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => shift_date_by_days(current, -7),
        (KeyCode::Char('H'), _) => shift_date_by_months(current, -1),
        (KeyCode::Char('L'), _) => shift_date_by_months(current, 1),
        (KeyCode::Char('['), _) => shift_date_by_years(current, -1),
        (KeyCode::Char(']'), _) => shift_date_by_years(current, 1),
        _ => None,
    };

    if let Some(date) = next {
        view_data.date_picker.selected = Some(date);
    }
}

fn shift_date_by_days(date: Date, days: i64) -> Option<Date> {
    date.checked_add(time::Duration::days(days))
}

fn shift_date_by_years(date: Date, years: i32) -> Option<Date> {
    shift_date_by_months(date, years.saturating_mul(12))
}

fn shift_date_by_months(date: Date, months: i32) -> Option<Date> {
    let total_month = i32::from(date.month() as u8) - 1 + months;
    let year = date.year() + total_month.div_euclid(12);
    let month = Month::try_from((total_month.rem_euclid(12) + 1) as u8).ok()?;
    let day = date.day().min(time::util::days_in_year_month(year, month));
    Date::from_calendar_date(year, month, day).ok()
}

fn load_tables<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) {
    match runtime.list_tables() {
        Ok(tables) => {
            view_data.tables.tables = tables;
            view_data.tables.error = None;
        }
        Err(error) => {
            view_data.tables.tables.clear();
            view_data.tables.error = Some(format!("Failed to load tables: {error:#}"));
        }
    }
    let total = view_data.tables.filtered().len();
    view_data.tables.list.clamp(total);
}

/// The schema only decorates the grid; records still load when it fails.
fn load_records<R: AppRuntime>(runtime: &mut R, view: &mut RecordsView) {
    view.schema = runtime.load_schema(&view.table).ok();
    match runtime.list_records(&view.table) {
        Ok(records) => {
            view.records = records;
            view.error = None;
        }
        Err(error) => {
            view.records.clear();
            view.error = Some(format!(
                "Failed to load records for table {}. {error:#}",
                view.table
            ));
        }
    }
    let total = view.filtered().len();
    view.list.clamp(total);
}

fn load_detail<R: AppRuntime>(state: &AppState, runtime: &mut R, view_data: &mut ViewData) {
    let Screen::RecordDetail { table, target, .. } = &state.screen else {
        return;
    };

    let schema = runtime.load_schema(table);
    let mut detail = DetailView::default();
    match (target, schema) {
        (DetailTarget::New, Ok(schema)) => {
            match RecordForm::for_new(table, Some(&schema)) {
                Ok(form) => {
                    detail.field_index = form
                        .fields()
                        .iter()
                        .position(|field| !field.is_primary_key)
                        .unwrap_or(0);
                    detail.form = Some(form);
                }
                Err(error) => {
                    detail.error = Some(format!("Failed to load record details: {error}"));
                }
            }
            detail.schema = Some(schema);
        }
        (DetailTarget::New, Err(error)) => {
            detail.error = Some(format!("Failed to load record details: {error:#}"));
        }
        (DetailTarget::Existing(row), schema) => {
            let schema = schema.ok();
            let id_field = schema
                .as_ref()
                .map_or(DEFAULT_ID_FIELD, TableSchema::id_field)
                .to_owned();
            let id = RecordId::new(row.get(&id_field).cloned().unwrap_or(Value::Null));
            let loaded = if id.is_missing() {
                Ok(row.clone())
            } else {
                runtime.load_record(table, &id)
            };
            match loaded {
                Ok(record) => {
                    detail.form = Some(RecordForm::for_existing(table, schema.as_ref(), &record));
                    detail.loaded = Some(record);
                }
                Err(error) => {
                    detail.error = Some(format!("Failed to load record details: {error:#}"));
                }
            }
            detail.schema = schema;
        }
    }
    view_data.detail = detail;
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let breadcrumb = Paragraph::new(render_breadcrumb_text(state, view_data))
        .block(Block::default().title("tabex").borders(Borders::ALL));
    frame.render_widget(breadcrumb, layout[0]);

    match state.screen.kind() {
        ScreenKind::Tables => render_tables(frame, layout[1], view_data),
        ScreenKind::Records => render_records(frame, layout[1], view_data),
        ScreenKind::RecordDetail => {
            let title = view_data
                .detail
                .form
                .as_ref()
                .map_or_else(|| "record".to_owned(), RecordForm::title);
            let body = Paragraph::new(render_detail_text(state, view_data))
                .wrap(Wrap { trim: false })
                .block(Block::default().title(title).borders(Borders::ALL));
            frame.render_widget(body, layout[1]);
        }
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if view_data.pending_delete.is_some() {
        let area = centered_rect(50, 25, frame.area());
        frame.render_widget(Clear, area);
        let confirm = Paragraph::new(render_delete_confirm_text(view_data))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("delete record")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Red)),
            );
        frame.render_widget(confirm, area);
    }

    if view_data.date_picker.visible {
        let area = centered_rect(48, 30, frame.area());
        frame.render_widget(Clear, area);
        let picker = Paragraph::new(render_date_picker_overlay_text(&view_data.date_picker))
            .block(Block::default().title("date").borders(Borders::ALL));
        frame.render_widget(picker, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_breadcrumb_text(state: &AppState, view_data: &ViewData) -> String {
    let mut parts = vec!["tables".to_owned()];
    if let Some(table) = state.screen.table() {
        parts.push(table.to_owned());
    }
    if state.screen.kind() == ScreenKind::RecordDetail {
        parts.push(
            view_data
                .detail
                .form
                .as_ref()
                .map_or_else(|| "record".to_owned(), RecordForm::title),
        );
    }
    parts.join(" > ")
}

fn render_tables(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let view = &view_data.tables;
    let filtered = view.filtered();
    let title = format!("tables {}", view.list.title_suffix(filtered.len()));

    if let Some(error) = &view.error {
        let body = Paragraph::new(format!("{error}\n\npress r to retry"))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: false })
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(body, area);
        return;
    }

    let rows = view
        .list
        .pager
        .slice(&filtered)
        .iter()
        .map(|table| table_row_cells(table).to_vec())
        .collect::<Vec<_>>();
    let empty = if view.tables.is_empty() {
        "No tables found."
    } else {
        "No tables matched the filter."
    };
    render_grid(
        frame,
        area,
        title,
        &TABLE_HEADERS.map(str::to_owned),
        rows,
        view.list.selected,
        empty,
    );
}

fn render_records(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let Some(view) = &view_data.records else {
        return;
    };

    let notices = records_notice_lines(view);
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(notices.len() as u16), Constraint::Min(1)])
        .split(area);
    if !notices.is_empty() {
        let notice = Paragraph::new(notices.join("\n"))
            .style(Style::default().fg(Color::Magenta))
            .wrap(Wrap { trim: false });
        frame.render_widget(notice, sections[0]);
    }

    let filtered = view.filtered();
    let title = format!("{} {}", view.table, view.list.title_suffix(filtered.len()));
    let columns = view.columns();
    let headers = columns
        .iter()
        .map(|column| column.header.clone())
        .collect::<Vec<_>>();
    let rows = view
        .list
        .pager
        .slice(&filtered)
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| grid_cell(record, column))
                .collect()
        })
        .collect::<Vec<Vec<String>>>();
    let empty = if view.records.is_empty() {
        "No records found."
    } else {
        "No records matched the filter."
    };
    render_grid(
        frame,
        sections[1],
        title,
        &headers,
        rows,
        view.list.selected,
        empty,
    );
}

fn render_grid(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    title: String,
    headers: &[String],
    rows: Vec<Vec<String>>,
    selected: usize,
    empty_message: &str,
) {
    let block = Block::default().title(title).borders(Borders::ALL);
    if rows.is_empty() {
        frame.render_widget(Paragraph::new(empty_message.to_owned()).block(block), area);
        return;
    }

    let widths = vec![Constraint::Min(8); headers.len().max(1)];
    let header = Row::new(headers.iter().map(|label| {
        Cell::from(label.clone()).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let body = rows.into_iter().enumerate().map(|(index, cells)| {
        let style = if index == selected {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new(cells.into_iter().map(Cell::from)).style(style)
    });

    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(1)
        .block(block);
    frame.render_widget(table, area);
}

fn table_row_cells(table: &TableMetadata) -> [String; 5] {
    let or_dash = |value: Option<&str>| {
        value
            .filter(|text| !text.is_empty())
            .unwrap_or(EMPTY_CELL)
            .to_owned()
    };
    [
        table.label().to_owned(),
        table
            .table_type
            .as_deref()
            .filter(|kind| !kind.is_empty())
            .unwrap_or(DEFAULT_TABLE_TYPE)
            .to_owned(),
        or_dash(table.description.as_deref()),
        table
            .record_count
            .map_or_else(|| EMPTY_CELL.to_owned(), format_count),
        table
            .last_updated
            .as_ref()
            .map_or_else(
                || EMPTY_CELL.to_owned(),
                |raw| format_date_time(&Value::String(raw.clone())),
            ),
    ]
}

fn records_notice_lines(view: &RecordsView) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(error) = &view.error {
        lines.push(format!("{error} (press r to retry)"));
    }
    if !view.has_primary_key() {
        lines.push(NO_PRIMARY_KEY_NOTICE.to_owned());
    }
    lines
}

fn render_detail_text(state: &AppState, view_data: &ViewData) -> String {
    let detail = &view_data.detail;
    let mut lines = Vec::new();
    if let Some(error) = &detail.error {
        lines.push(format!("! {error}"));
        lines.push(String::new());
    }
    let Some(form) = &detail.form else {
        lines.push("esc back to records".to_owned());
        return lines.join("\n");
    };

    let editing = state.screen.is_editing();
    for (index, field) in form.fields().iter().enumerate() {
        let cursor = if index == detail.field_index { ">" } else { " " };
        let required = if field.is_required { "*" } else { "" };
        let key_note = if field.is_primary_key { ", key" } else { "" };
        lines.push(format!(
            "{cursor} {}{required} ({}{key_note})",
            field.name,
            field.kind.label()
        ));

        let value = if editing {
            field_widget_text(form, field, index == detail.field_index)
        } else {
            field.display().unwrap_or_else(|| NULL_MARKER.to_owned())
        };
        for line in value.split('\n') {
            lines.push(format!("    {line}"));
        }
        if let Some(error) = form.error(&field.name) {
            lines.push(format!("    ! {error}"));
        }
    }
    lines.join("\n")
}

fn field_widget_text(form: &RecordForm, field: &EditableField, focused: bool) -> String {
    let cursor = if focused { "_" } else { "" };
    if form.is_read_only(&field.name) {
        let shown = field.display().unwrap_or_else(|| NULL_MARKER.to_owned());
        return format!("{shown} (read-only)");
    }
    match field.kind {
        FieldKind::Boolean => {
            if field.is_checked() {
                "[x] yes".to_owned()
            } else {
                "[ ] no".to_owned()
            }
        }
        FieldKind::Date => format!("{}{cursor} [enter: pick date]", field.input_text()),
        FieldKind::Text | FieldKind::LongText | FieldKind::Number | FieldKind::Unknown => {
            format!("{}{cursor}", field.input_text())
        }
    }
}

fn render_delete_confirm_text(view_data: &ViewData) -> String {
    let id = view_data
        .pending_delete
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    [
        "Are you sure you want to delete this record? This action cannot be undone.".to_owned(),
        String::new(),
        format!("record: {id}"),
        String::new(),
        "y/enter delete | n/esc cancel".to_owned(),
    ]
    .join("\n")
}

fn render_date_picker_overlay_text(date_picker: &DatePickerUiState) -> String {
    let selected = date_picker
        .selected
        .map(|date| date.to_string())
        .unwrap_or_else(|| EMPTY_CELL.to_owned());
    let original = date_picker
        .original
        .map(|date| date.to_string())
        .unwrap_or_else(|| "(empty)".to_owned());

    [
        format!("field: {}", date_picker.field),
        format!("orig: {original}"),
        format!("pick: {selected}"),
        String::new(),
        "h/l day | j/k week | H/L month | [/] year".to_owned(),
        "enter pick | esc cancel".to_owned(),
    ]
    .join("\n")
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let (mode, hints) = match state.screen.kind() {
        ScreenKind::Tables => ("TABLES", "j/k row | h/l page | / find | enter open | r refresh"),
        ScreenKind::Records => (
            "RECORDS",
            "j/k row | h/l page | / find | enter view | a add | d delete | r refresh | esc back",
        ),
        ScreenKind::RecordDetail if state.screen.is_editing() => (
            "EDIT",
            "tab/shift+tab field | space toggle | enter pick date | ctrl+s save | esc cancel",
        ),
        ScreenKind::RecordDetail => ("VIEW", "e edit | j/k field | r reload | esc back"),
    };
    let hints = if view_data.help_visible {
        "esc close help"
    } else {
        hints
    };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints} | ? help | ctrl+q"),
        None => format!("{mode} | {hints} | ? help | ctrl+q"),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
lists: j/k row | h/l or pgup/pgdn page | / find (enter keep, esc clear) | r refresh/retry\n\
tables: enter open table\n\
records: enter view record | a add | d delete | esc back\n\
record: e edit | j/k field | r reload | esc back\n\
edit: tab/shift+tab field | type to edit | backspace erase | space toggle | enter newline or pick date | ctrl+s save | esc cancel\n\
date picker: h/l day j/k week H/L month [/] year enter pick esc cancel\n\
delete: y/enter confirm | n/esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
