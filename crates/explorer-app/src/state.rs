// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    LifecyclePhase, LifecycleState, QueryLifecycle, QueryOutcome, QueryTicket, RequestId,
    Resolution, ViewMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewModeController {
    current: ViewMode,
}

impl Default for ViewModeController {
    fn default() -> Self {
        Self::new(ViewMode::Table)
    }
}

impl ViewModeController {
    pub const fn new(initial: ViewMode) -> Self {
        Self { current: initial }
    }

    pub const fn current(&self) -> ViewMode {
        self.current
    }

    pub fn select(&mut self, mode: ViewMode) {
        self.current = mode;
    }

    fn rotate(&mut self, delta: isize) -> ViewMode {
        let modes = ViewMode::ALL;
        let current = modes
            .iter()
            .position(|mode| *mode == self.current)
            .unwrap_or(0) as isize;
        let len = modes.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.current = modes[next];
        self.current
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub lifecycle: QueryLifecycle,
    pub view: ViewModeController,
    pub status_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Submit(String),
    Resolve {
        request_id: RequestId,
        outcome: QueryOutcome,
    },
    NewSearch,
    SelectView(ViewMode),
    NextView,
    PrevView,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    RequestDispatched(QueryTicket),
    PhaseChanged(LifecyclePhase),
    ErrorRaised {
        request_id: RequestId,
        message: String,
    },
    StaleResponseDropped(RequestId),
    ViewChanged(ViewMode),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn with_view(initial: ViewMode) -> Self {
        Self {
            view: ViewModeController::new(initial),
            ..Self::default()
        }
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::Submit(text) => match self.lifecycle.submit(&text) {
                Some(ticket) => vec![
                    AppEvent::PhaseChanged(LifecyclePhase::Loading),
                    AppEvent::RequestDispatched(ticket),
                ],
                None => Vec::new(),
            },
            AppCommand::Resolve {
                request_id,
                outcome,
            } => match self.lifecycle.resolve(request_id, outcome) {
                Resolution::Stale => vec![AppEvent::StaleResponseDropped(request_id)],
                Resolution::Applied(phase) => {
                    let mut events = vec![AppEvent::PhaseChanged(phase)];
                    if let LifecycleState::Error {
                        request_id,
                        message,
                    } = self.lifecycle.state()
                    {
                        events.push(AppEvent::ErrorRaised {
                            request_id: *request_id,
                            message: message.clone(),
                        });
                    }
                    events
                }
            },
            AppCommand::NewSearch => {
                if self.lifecycle.reset() {
                    vec![AppEvent::PhaseChanged(LifecyclePhase::Idle)]
                } else {
                    Vec::new()
                }
            }
            AppCommand::SelectView(mode) => {
                self.view.select(mode);
                vec![AppEvent::ViewChanged(mode)]
            }
            AppCommand::NextView => vec![AppEvent::ViewChanged(self.view.rotate(1))],
            AppCommand::PrevView => vec![AppEvent::ViewChanged(self.view.rotate(-1))],
            AppCommand::SetStatus(message) => {
                self.status_line = Some(message.clone());
                vec![AppEvent::StatusUpdated(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }
}
