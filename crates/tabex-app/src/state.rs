// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::Record;

pub const SAVED_STATUS: &str = "Record saved successfully.";

#[derive(Debug, Clone, PartialEq)]
pub enum DetailTarget {
    Existing(Record),
    New,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Tables,
    Records {
        table: String,
    },
    RecordDetail {
        table: String,
        target: DetailTarget,
        editing: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Tables,
    Records,
    RecordDetail,
}

impl Screen {
    pub const fn kind(&self) -> ScreenKind {
        match self {
            Self::Tables => ScreenKind::Tables,
            Self::Records { .. } => ScreenKind::Records,
            Self::RecordDetail { .. } => ScreenKind::RecordDetail,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Tables => None,
            Self::Records { table } | Self::RecordDetail { table, .. } => Some(table),
        }
    }

    pub const fn is_editing(&self) -> bool {
        matches!(self, Self::RecordDetail { editing: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub screen: Screen,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            screen: Screen::Tables,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    SelectTable(String),
    SelectRecord(Record),
    CreateRecord,
    Back,
    ToggleEdit,
    RecordSaved(Record),
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ScreenChanged(ScreenKind),
    EditModeChanged(bool),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    /// Applies one user-driven command. Commands that make no sense on the
    /// current screen produce no events and leave the state untouched.
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::SelectTable(table) => {
                if self.screen != Screen::Tables {
                    return Vec::new();
                }
                self.enter(Screen::Records { table })
            }
            AppCommand::SelectRecord(record) => {
                let Screen::Records { table } = &self.screen else {
                    return Vec::new();
                };
                let table = table.clone();
                self.enter(Screen::RecordDetail {
                    table,
                    target: DetailTarget::Existing(record),
                    editing: false,
                })
            }
            AppCommand::CreateRecord => {
                let Screen::Records { table } = &self.screen else {
                    return Vec::new();
                };
                let table = table.clone();
                let mut events = self.enter(Screen::RecordDetail {
                    table,
                    target: DetailTarget::New,
                    editing: true,
                });
                events.push(AppEvent::EditModeChanged(true));
                events
            }
            AppCommand::Back => self.back(),
            AppCommand::ToggleEdit => {
                let Screen::RecordDetail { editing, .. } = &mut self.screen else {
                    return Vec::new();
                };
                *editing = !*editing;
                vec![AppEvent::EditModeChanged(*editing)]
            }
            AppCommand::RecordSaved(saved) => self.record_saved(saved),
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn enter(&mut self, screen: Screen) -> Vec<AppEvent> {
        let kind = screen.kind();
        self.screen = screen;
        vec![AppEvent::ScreenChanged(kind)]
    }

    fn back(&mut self) -> Vec<AppEvent> {
        let previous = match &self.screen {
            Screen::Tables => return Vec::new(),
            Screen::Records { .. } => Screen::Tables,
            Screen::RecordDetail { table, .. } => Screen::Records {
                table: table.clone(),
            },
        };
        let was_editing = self.screen.is_editing();
        let mut events = self.enter(previous);
        if was_editing {
            events.insert(0, AppEvent::EditModeChanged(false));
        }
        events
    }

    fn record_saved(&mut self, saved: Record) -> Vec<AppEvent> {
        let Screen::RecordDetail {
            target, editing, ..
        } = &mut self.screen
        else {
            return Vec::new();
        };

        let mut events = Vec::new();
        // An existing record drops back to the read view; a freshly created
        // one stays editable.
        if matches!(target, DetailTarget::Existing(_)) && *editing {
            *editing = false;
            events.push(AppEvent::EditModeChanged(false));
        }
        *target = DetailTarget::Existing(saved);
        events.push(self.set_status(SAVED_STATUS));
        events
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, DetailTarget, SAVED_STATUS, Screen, ScreenKind};
    use crate::Record;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().expect("object literal")
    }

    fn at_records(table: &str) -> AppState {
        AppState {
            screen: Screen::Records {
                table: table.to_owned(),
            },
            ..AppState::default()
        }
    }

    #[test]
    fn drill_down_and_back_out() {
        let mut state = AppState::default();

        let events = state.dispatch(AppCommand::SelectTable("users".to_owned()));
        assert_eq!(events, vec![AppEvent::ScreenChanged(ScreenKind::Records)]);
        assert_eq!(state.screen.table(), Some("users"));

        let row = record(json!({"id": 1}));
        let events = state.dispatch(AppCommand::SelectRecord(row.clone()));
        assert_eq!(events, vec![AppEvent::ScreenChanged(ScreenKind::RecordDetail)]);
        assert_eq!(
            state.screen,
            Screen::RecordDetail {
                table: "users".to_owned(),
                target: DetailTarget::Existing(row),
                editing: false,
            }
        );

        state.dispatch(AppCommand::Back);
        assert_eq!(state.screen.kind(), ScreenKind::Records);
        state.dispatch(AppCommand::Back);
        assert_eq!(state.screen, Screen::Tables);
        assert!(state.dispatch(AppCommand::Back).is_empty());
    }

    #[test]
    fn create_opens_detail_in_edit_mode() {
        let mut state = at_records("users");

        let events = state.dispatch(AppCommand::CreateRecord);
        assert_eq!(
            events,
            vec![
                AppEvent::ScreenChanged(ScreenKind::RecordDetail),
                AppEvent::EditModeChanged(true),
            ]
        );
        assert!(state.screen.is_editing());
    }

    #[test]
    fn back_from_editing_clears_edit_mode() {
        let mut state = at_records("users");
        state.dispatch(AppCommand::CreateRecord);

        let events = state.dispatch(AppCommand::Back);
        assert_eq!(
            events,
            vec![
                AppEvent::EditModeChanged(false),
                AppEvent::ScreenChanged(ScreenKind::Records),
            ]
        );
        assert!(!state.screen.is_editing());
    }

    #[test]
    fn toggle_edit_only_applies_on_detail() {
        let mut state = at_records("users");
        assert!(state.dispatch(AppCommand::ToggleEdit).is_empty());

        state.dispatch(AppCommand::SelectRecord(record(json!({"id": 2}))));
        assert_eq!(
            state.dispatch(AppCommand::ToggleEdit),
            vec![AppEvent::EditModeChanged(true)]
        );
        assert_eq!(
            state.dispatch(AppCommand::ToggleEdit),
            vec![AppEvent::EditModeChanged(false)]
        );
    }

    #[test]
    fn saving_existing_record_leaves_edit_mode() {
        let mut state = at_records("users");
        state.dispatch(AppCommand::SelectRecord(record(json!({"id": 1, "email": ""}))));
        state.dispatch(AppCommand::ToggleEdit);

        let saved = record(json!({"id": 1, "email": "a@b.com"}));
        let events = state.dispatch(AppCommand::RecordSaved(saved.clone()));
        assert_eq!(
            events,
            vec![
                AppEvent::EditModeChanged(false),
                AppEvent::StatusUpdated(SAVED_STATUS.to_owned()),
            ]
        );
        assert_eq!(
            state.screen,
            Screen::RecordDetail {
                table: "users".to_owned(),
                target: DetailTarget::Existing(saved),
                editing: false,
            }
        );
    }

    #[test]
    fn saving_new_record_stays_editing_with_server_copy() {
        let mut state = at_records("users");
        state.dispatch(AppCommand::CreateRecord);

        let saved = record(json!({"id": 9, "email": "n@b.com"}));
        let events = state.dispatch(AppCommand::RecordSaved(saved.clone()));
        assert_eq!(events, vec![AppEvent::StatusUpdated(SAVED_STATUS.to_owned())]);
        assert!(state.screen.is_editing());
        assert!(matches!(
            &state.screen,
            Screen::RecordDetail { target: DetailTarget::Existing(row), .. } if *row == saved
        ));
    }

    #[test]
    fn selection_commands_ignored_on_wrong_screen() {
        let mut state = AppState::default();
        assert!(state.dispatch(AppCommand::CreateRecord).is_empty());
        assert!(
            state
                .dispatch(AppCommand::SelectRecord(record(json!({"id": 1}))))
                .is_empty()
        );
        assert!(
            state
                .dispatch(AppCommand::RecordSaved(record(json!({}))))
                .is_empty()
        );

        let mut state = at_records("users");
        assert!(
            state
                .dispatch(AppCommand::SelectTable("orders".to_owned()))
                .is_empty()
        );
    }

    #[test]
    fn status_set_and_clear() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::SetStatus("refreshed".to_owned()));
        assert_eq!(events, vec![AppEvent::StatusUpdated("refreshed".to_owned())]);
        assert_eq!(state.status_line.as_deref(), Some("refreshed"));

        assert_eq!(
            state.dispatch(AppCommand::ClearStatus),
            vec![AppEvent::StatusCleared]
        );
        assert!(state.status_line.is_none());
    }
}
