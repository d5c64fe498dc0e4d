// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{QueryOutcome, QueryResult, RequestId, TRANSPORT_FAILURE_MESSAGE};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Loading,
    Error {
        request_id: RequestId,
        message: String,
    },
    Success {
        result: QueryResult,
    },
}

impl LifecycleState {
    pub const fn phase(&self) -> LifecyclePhase {
        match self {
            Self::Idle => LifecyclePhase::Idle,
            Self::Loading => LifecyclePhase::Loading,
            Self::Error { .. } => LifecyclePhase::Error,
            Self::Success { .. } => LifecyclePhase::Success,
        }
    }

    pub fn result(&self) -> Option<&QueryResult> {
        match self {
            Self::Success { result } => Some(result),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Idle,
    Loading,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub request_id: RequestId,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied(LifecyclePhase),
    Stale,
}

/// Owns the single outstanding request. Responses are fed back in as
/// events; any response whose id is not the current in-flight id is
/// dropped, which covers both superseded requests and late replies that
/// arrive after a reset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryLifecycle {
    state: LifecycleState,
    in_flight: Option<RequestId>,
    next_request_id: u64,
}

impl QueryLifecycle {
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub const fn phase(&self) -> LifecyclePhase {
        self.state.phase()
    }

    pub const fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    pub fn submit(&mut self, text: &str) -> Option<QueryTicket> {
        let query = text.trim();
        if query.is_empty() {
            return None;
        }

        let request_id = self.allocate_request_id();
        if let Some(previous) = self.in_flight.replace(request_id) {
            debug!(
                superseded = previous.get(),
                request_id = request_id.get(),
                "query superseded"
            );
        }
        self.state = LifecycleState::Loading;
        debug!(request_id = request_id.get(), "query dispatched");

        Some(QueryTicket {
            request_id,
            query: query.to_owned(),
        })
    }

    pub fn resolve(&mut self, request_id: RequestId, outcome: QueryOutcome) -> Resolution {
        if self.in_flight != Some(request_id) {
            debug!(request_id = request_id.get(), "stale response dropped");
            return Resolution::Stale;
        }
        self.in_flight = None;

        self.state = match outcome {
            QueryOutcome::Success(result) => {
                debug!(
                    request_id = request_id.get(),
                    rows = result.row_count(),
                    "query succeeded"
                );
                LifecycleState::Success { result }
            }
            QueryOutcome::ServiceError(message) => {
                debug!(request_id = request_id.get(), %message, "query service reported error");
                LifecycleState::Error {
                    request_id,
                    message,
                }
            }
            QueryOutcome::TransportFailure(detail) => {
                warn!(request_id = request_id.get(), %detail, "query transport failed");
                LifecycleState::Error {
                    request_id,
                    message: TRANSPORT_FAILURE_MESSAGE.to_owned(),
                }
            }
        };
        Resolution::Applied(self.state.phase())
    }

    pub fn reset(&mut self) -> bool {
        match self.state {
            LifecycleState::Success { .. } | LifecycleState::Error { .. } => {
                self.state = LifecycleState::Idle;
                self.in_flight = None;
                true
            }
            LifecycleState::Idle | LifecycleState::Loading => false,
        }
    }

    fn allocate_request_id(&mut self) -> RequestId {
        self.next_request_id = self.next_request_id.wrapping_add(1);
        if self.next_request_id == 0 {
            self.next_request_id = 1;
        }
        RequestId::new(self.next_request_id)
    }
}
