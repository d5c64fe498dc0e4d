// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;
use thiserror::Error;

pub const TRANSPORT_FAILURE_MESSAGE: &str = "Failed to connect to backend.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Null,
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(value) => value.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Self::Null => None,
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Self::Null),
            serde_json::Value::String(text) => Some(Self::Text(text.clone())),
            serde_json::Value::Number(number) => number.as_f64().map(Self::Number),
            serde_json::Value::Bool(flag) => Some(Self::Text(flag.to_string())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("row {row} has {actual} cells but the result has {expected} columns")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("column {0:?} appears more than once")]
    DuplicateColumn(String),
    #[error("row {row} column {column} holds a nested value; only text, numbers and null are supported")]
    UnsupportedCell { row: usize, column: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    sql: String,
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    pub fn new(
        sql: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<CellValue>>,
    ) -> Result<Self, ShapeError> {
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(ShapeError::DuplicateColumn(column.clone()));
            }
        }

        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ShapeError::RowLength {
                    row: index,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }

        Ok(Self {
            sql: sql.into(),
            columns,
            rows,
        })
    }

    pub fn from_json_rows(
        sql: impl Into<String>,
        columns: Vec<String>,
        rows: &[Vec<serde_json::Value>],
    ) -> Result<Self, ShapeError> {
        let mut converted = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.iter().enumerate() {
            let mut cells = Vec::with_capacity(row.len());
            for (column_index, value) in row.iter().enumerate() {
                let cell = CellValue::from_json(value).ok_or(ShapeError::UnsupportedCell {
                    row: row_index,
                    column: column_index,
                })?;
                cells.push(cell);
            }
            converted.push(cells);
        }
        Self::new(sql, columns, converted)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Success(QueryResult),
    ServiceError(String),
    TransportFailure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    Table,
    Cards,
    Chart,
}

impl ViewMode {
    pub const ALL: [Self; 3] = [Self::Table, Self::Cards, Self::Chart];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Cards => "cards",
            Self::Chart => "chart",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Table => "Table View",
            Self::Cards => "Card View",
            Self::Chart => "Chart View",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "table" => Some(Self::Table),
            "cards" => Some(Self::Cards),
            "chart" => Some(Self::Chart),
            _ => None,
        }
    }
}
