// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use explorer_app::{QueryOutcome, QueryResult};
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct Client {
    url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            bail!("service.url must not be empty");
        }
        let parsed = Url::parse(url).with_context(|| format!("invalid service url {url:?}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "service url {url:?} must use http or https, got {:?}",
                parsed.scheme()
            );
        }
        if timeout.is_zero() {
            bail!("service.timeout must be positive");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            url: url.to_owned(),
            timeout,
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn query(&self, question: &str) -> QueryOutcome {
        debug!(url = %self.url, "sending query");
        match self.send(question) {
            Ok(body) => decode_response(&body),
            Err(error) => {
                let detail = format!("{error:#}");
                warn!(url = %self.url, %detail, "query service unreachable");
                QueryOutcome::TransportFailure(detail)
            }
        }
    }

    fn send(&self, question: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .json(&QueryRequest { query: question })
            .send()
            .map_err(|error| connection_error(&self.url, error))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "query service returned non-success status");
        }
        response.text().context("read query response body")
    }
}

pub fn decode_response(body: &str) -> QueryOutcome {
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "query response is not JSON");
            return QueryOutcome::TransportFailure(format!("decode query response: {error}"));
        }
    };

    if let Some(message) = service_error(&value) {
        return QueryOutcome::ServiceError(message);
    }

    let payload: QueryPayload = match serde_json::from_value(value) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(%error, "query response is missing result fields");
            return QueryOutcome::TransportFailure(format!("malformed query response: {error}"));
        }
    };

    match QueryResult::from_json_rows(payload.sql, payload.columns, &payload.rows) {
        Ok(result) => QueryOutcome::Success(result),
        Err(error) => {
            warn!(%error, "query response has an inconsistent shape");
            QueryOutcome::TransportFailure(format!("malformed query response: {error}"))
        }
    }
}

fn service_error(value: &serde_json::Value) -> Option<String> {
    match value.get("error")? {
        serde_json::Value::Null | serde_json::Value::Bool(false) => None,
        serde_json::Value::String(message) if message.is_empty() => None,
        serde_json::Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

fn connection_error(url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("query service at {url} timed out ({error})");
    }
    anyhow!("cannot reach query service at {url} ({error})")
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryPayload {
    sql: String,
    columns: Vec<String>,
    rows: Vec<Vec<serde_json::Value>>,
}
