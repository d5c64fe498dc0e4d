// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use explorer_app::{CellValue, Notification, Notifier, QueryResult};
use std::io::Read;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

const COUNTRIES: [&str; 12] = [
    "United Kingdom",
    "Netherlands",
    "EIRE",
    "Germany",
    "France",
    "Australia",
    "Spain",
    "Switzerland",
    "Belgium",
    "Sweden",
    "Japan",
    "Norway",
];

const PRODUCTS: [&str; 10] = [
    "WHITE HANGING HEART T-LIGHT HOLDER",
    "REGENCY CAKESTAND 3 TIER",
    "JUMBO BAG RED RETROSPOT",
    "PARTY BUNTING",
    "LUNCH BAG RED RETROSPOT",
    "ASSORTED COLOUR BIRD ORNAMENT",
    "SET OF 3 CAKE TINS PANTRY DESIGN",
    "PACK OF 72 RETROSPOT CAKE CASES",
    "NATURAL SLATE HEART CHALKBOARD",
    "HEART OF WICKER SMALL",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

#[derive(Debug, Clone)]
pub struct RetailFaker {
    rng: DeterministicRng,
}

impl RetailFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn customers_by_spend(&mut self, count: usize) -> Result<QueryResult> {
        let mut totals: Vec<(i64, f64)> = (0..count)
            .map(|index| {
                let id = 12_346 + (index as i64) * 7 + self.int_n(7) as i64;
                let cents = 5_000 + self.int_n(25_000_000) as i64;
                (id, cents as f64 / 100.0)
            })
            .collect();
        totals.sort_by(|left, right| right.1.total_cmp(&left.1));

        let rows = totals
            .into_iter()
            .map(|(id, spent)| vec![CellValue::from(id), CellValue::from(spent)])
            .collect();
        result(
            "SELECT customer_id, SUM(quantity * unit_price) AS total_spent FROM transactions GROUP BY customer_id ORDER BY total_spent DESC",
            &["customer_id", "total_spent"],
            rows,
        )
    }

    pub fn countries_by_revenue(&mut self, count: usize) -> Result<QueryResult> {
        let count = count.min(COUNTRIES.len());
        let mut revenue: Vec<i64> = (0..count)
            .map(|_| 1_000 + self.int_n(900_000) as i64)
            .collect();
        revenue.sort_unstable_by(|left, right| right.cmp(left));

        let rows = COUNTRIES
            .iter()
            .zip(revenue)
            .map(|(country, amount)| vec![CellValue::from(*country), CellValue::from(amount)])
            .collect();
        result(
            "SELECT country, SUM(quantity * unit_price) AS revenue FROM transactions GROUP BY country ORDER BY revenue DESC",
            &["country", "revenue"],
            rows,
        )
    }

    pub fn products_by_quantity(&mut self, count: usize) -> Result<QueryResult> {
        let count = count.min(PRODUCTS.len());
        let mut quantities: Vec<i64> = (0..count).map(|_| 1 + self.int_n(80_000) as i64).collect();
        quantities.sort_unstable_by(|left, right| right.cmp(left));

        let rows = PRODUCTS
            .iter()
            .zip(quantities)
            .map(|(product, quantity)| {
                vec![CellValue::from(*product), CellValue::from(quantity)]
            })
            .collect();
        result(
            "SELECT description, SUM(quantity) AS quantity FROM transactions GROUP BY description ORDER BY quantity DESC",
            &["description", "quantity"],
            rows,
        )
    }
}

fn result(sql: &str, columns: &[&str], rows: Vec<Vec<CellValue>>) -> Result<QueryResult> {
    QueryResult::new(
        sql,
        columns.iter().map(|column| (*column).to_owned()).collect(),
        rows,
    )
    .context("build fixture result")
}

pub fn countries_fixture() -> Result<QueryResult> {
    result(
        "SELECT country, SUM(revenue) AS revenue FROM sales GROUP BY country ORDER BY revenue DESC LIMIT 5",
        &["country", "revenue"],
        vec![
            vec![CellValue::from("UK"), CellValue::from(100_000_i64)],
            vec![CellValue::from("France"), CellValue::from(50_000_i64)],
        ],
    )
}

pub fn countries_fixture_json() -> String {
    serde_json::json!({
        "sql": "SELECT country, SUM(revenue) AS revenue FROM sales GROUP BY country ORDER BY revenue DESC LIMIT 5",
        "columns": ["country", "revenue"],
        "rows": [["UK", 100000], ["France", 50000]],
    })
    .to_string()
}

pub fn empty_fixture() -> Result<QueryResult> {
    result(
        "SELECT customer_id, total_spent FROM customers WHERE 1 = 0",
        &["customer_id", "total_spent"],
        Vec::new(),
    )
}

pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}

#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub received: Vec<Notification>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<&str> {
        self.received
            .iter()
            .map(|notification| notification.message.as_str())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notification: Notification) {
        self.received.push(notification);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedReply {
    pub status: u16,
    pub body: String,
    pub content_type: &'static str,
    pub delay: Duration,
}

impl ScriptedReply {
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "application/json",
            delay: Duration::ZERO,
        }
    }

    pub fn html(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "text/html",
            delay: Duration::ZERO,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

pub struct MockQueryService {
    url: String,
    handle: JoinHandle<Result<Vec<RecordedRequest>>>,
}

impl MockQueryService {
    pub fn start(replies: Vec<ScriptedReply>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let url = format!("http://{}/query", server.server_addr());

        let handle = thread::spawn(move || {
            let mut recorded = Vec::with_capacity(replies.len());
            for reply in replies {
                let mut request = server.recv().context("receive mock request")?;
                let mut body = String::new();
                request
                    .as_reader()
                    .read_to_string(&mut body)
                    .context("read mock request body")?;
                recorded.push(RecordedRequest {
                    method: request.method().as_str().to_owned(),
                    path: request.url().to_owned(),
                    content_type: request
                        .headers()
                        .iter()
                        .find(|header| header.field.equiv("Content-Type"))
                        .map(|header| header.value.as_str().to_owned()),
                    body,
                });

                if !reply.delay.is_zero() {
                    thread::sleep(reply.delay);
                }
                let header = Header::from_bytes("Content-Type", reply.content_type)
                    .map_err(|()| anyhow!("invalid content type {:?}", reply.content_type))?;
                let response = Response::from_string(reply.body)
                    .with_status_code(reply.status)
                    .with_header(header);
                // The client may have given up already.
                let _ = request.respond(response);
            }
            Ok(recorded)
        });

        Ok(Self { url, handle })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn finish(self) -> Result<Vec<RecordedRequest>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock server thread panicked"))?
    }
}
