// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{CellFormatter, QueryResult, ViewMode, derive_label};

const CHART_BASE_HUE: u16 = 210;
const CHART_HUE_STEP: u16 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardField {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub fields: Vec<CardField>,
}

#[derive(Debug, Clone)]
pub struct ChartBar {
    pub label: String,
    /// Magnitude relative to the first row. Not clamped, so unsorted input
    /// can produce values above 1.0.
    pub fraction: f64,
    pub value_label: String,
    pub hue: u16,
}

// Hue is decoration; keep it out of equality.
impl PartialEq for ChartBar {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label
            && self.fraction == other.fraction
            && self.value_label == other.value_label
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub label_header: String,
    pub value_header: String,
    pub bars: Vec<ChartBar>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderModel {
    Empty(ViewMode),
    Table(TableView),
    Cards(Vec<Card>),
    Chart(ChartView),
    ChartUnavailable(String),
}

pub fn project(result: &QueryResult, mode: ViewMode, formatter: &CellFormatter) -> RenderModel {
    if result.is_empty() {
        return RenderModel::Empty(mode);
    }

    match mode {
        ViewMode::Table => RenderModel::Table(project_table(result, formatter)),
        ViewMode::Cards => RenderModel::Cards(project_cards(result, formatter)),
        ViewMode::Chart => project_chart(result, formatter),
    }
}

pub fn project_table(result: &QueryResult, formatter: &CellFormatter) -> TableView {
    let columns = result.columns();
    TableView {
        headers: columns.iter().map(|column| derive_label(column)).collect(),
        rows: result
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(columns)
                    .map(|(cell, column)| formatter.format(cell, column))
                    .collect()
            })
            .collect(),
    }
}

pub fn project_cards(result: &QueryResult, formatter: &CellFormatter) -> Vec<Card> {
    let columns = result.columns();
    result
        .rows()
        .iter()
        .map(|row| Card {
            fields: columns
                .iter()
                .zip(row)
                .map(|(column, cell)| CardField {
                    label: derive_label(column),
                    value: formatter.format(cell, column),
                })
                .collect(),
        })
        .collect()
}

/// Column 0 labels each bar and column 1 sizes it. Widths are relative to
/// the first row, so callers should hand in results sorted by magnitude,
/// largest first.
fn project_chart(result: &QueryResult, formatter: &CellFormatter) -> RenderModel {
    let columns = result.columns();
    if columns.len() < 2 {
        return RenderModel::ChartUnavailable(format!(
            "chart needs a label column and a value column; this result has {}",
            columns.len()
        ));
    }

    let label_column = &columns[0];
    let value_column = &columns[1];
    let reference = result
        .rows()
        .first()
        .and_then(|row| row[1].as_number())
        .filter(|value| *value != 0.0);

    let bars = result
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let fraction = match (reference, row[1].as_number()) {
                (Some(reference), Some(value)) => value / reference,
                _ => 0.0,
            };
            ChartBar {
                label: formatter.format(&row[0], label_column),
                fraction,
                value_label: formatter.format(&row[1], value_column),
                hue: chart_hue(index),
            }
        })
        .collect();

    RenderModel::Chart(ChartView {
        label_header: derive_label(label_column),
        value_header: derive_label(value_column),
        bars,
    })
}

pub fn chart_hue(index: usize) -> u16 {
    let step = (index % 360) as u32 * u32::from(CHART_HUE_STEP);
    ((u32::from(CHART_BASE_HUE) + step) % 360) as u16
}
