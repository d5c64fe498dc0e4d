// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use explorer_app::{QueryOutcome, QueryTicket};
use explorer_client::Client;
use explorer_tui::InternalEvent;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::debug;

pub struct ClientRuntime {
    client: Client,
}

impl ClientRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl explorer_tui::AppRuntime for ClientRuntime {
    fn run_query(&mut self, question: &str) -> QueryOutcome {
        self.client.query(question)
    }

    fn spawn_query(&mut self, ticket: &QueryTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        let ticket = ticket.clone();
        thread::Builder::new()
            .name(format!("query-{}", ticket.request_id.get()))
            .spawn(move || {
                let outcome = client.query(&ticket.query);
                let event = InternalEvent::QueryResolved {
                    request_id: ticket.request_id,
                    outcome,
                };
                if tx.send(event).is_err() {
                    debug!(
                        request_id = ticket.request_id.get(),
                        "ui gone before query finished"
                    );
                }
            })
            .context("spawn query worker")?;
        Ok(())
    }
}
