// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use explorer_app::{
    AppCommand, AppEvent, AppState, Card, CellFormatter, ChartView, LifecyclePhase, LifecycleState,
    Notification, NotificationBridge, Notifier, QueryOutcome, QueryTicket, RenderModel, RequestId,
    TableView, ViewMode, project,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::debug;

const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const CHART_LABEL_MAX: usize = 24;
const BAR_GLYPH: &str = "█";
const OVERFLOW_MARK: &str = ">";
const EMPTY_RESULT_TEXT: &str = "No rows returned.";
const PROMPT_PLACEHOLDER: &str = "Ask a question about the dataset...";

pub trait AppRuntime {
    fn run_query(&mut self, question: &str) -> QueryOutcome;

    fn spawn_query(&mut self, ticket: &QueryTicket, tx: Sender<InternalEvent>) -> Result<()> {
        let outcome = self.run_query(&ticket.query);
        tx.send(InternalEvent::QueryResolved {
            request_id: ticket.request_id,
            outcome,
        })
        .map_err(|_| anyhow::anyhow!("query event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    QueryResolved {
        request_id: RequestId,
        outcome: QueryOutcome,
    },
}

#[derive(Debug, Clone, Default)]
struct ToastQueue {
    pending: Vec<Notification>,
}

impl Notifier for ToastQueue {
    fn notify(&mut self, notification: Notification) {
        self.pending.push(notification);
    }
}

#[derive(Debug, Clone, Default)]
struct ViewData {
    input: String,
    formatter: CellFormatter,
    bridge: NotificationBridge<ToastQueue>,
    status_token: u64,
    scroll: u16,
}

impl ViewData {
    fn new(formatter: CellFormatter) -> Self {
        Self {
            formatter,
            ..Self::default()
        }
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    formatter: CellFormatter,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(formatter);
    let (internal_tx, internal_rx) = mpsc::channel();

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

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
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
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

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::QueryResolved {
                request_id,
                outcome,
            } => {
                dispatch_and_notify(
                    state,
                    runtime,
                    view_data,
                    tx,
                    AppCommand::Resolve {
                        request_id,
                        outcome,
                    },
                );
            }
        }
    }
}

fn dispatch_and_notify<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: AppCommand,
) -> Vec<AppEvent> {
    let events = state.dispatch(command);
    for event in &events {
        match event {
            AppEvent::RequestDispatched(ticket) => {
                if let Err(error) = runtime.spawn_query(ticket, tx.clone()) {
                    state.dispatch(AppCommand::Resolve {
                        request_id: ticket.request_id,
                        outcome: QueryOutcome::TransportFailure(format!(
                            "start query request: {error}"
                        )),
                    });
                }
            }
            AppEvent::PhaseChanged(_) | AppEvent::ViewChanged(_) => {
                view_data.scroll = 0;
            }
            AppEvent::StaleResponseDropped(request_id) => {
                debug!(request_id = request_id.get(), "ignored superseded response");
            }
            AppEvent::ErrorRaised { .. } | AppEvent::StatusUpdated(_) | AppEvent::StatusCleared => {
            }
        }
    }

    view_data.bridge.observe(state.lifecycle.state());
    let toasts = std::mem::take(&mut view_data.bridge.notifier_mut().pending);
    for toast in toasts {
        emit_status(state, view_data, tx, toast.message);
    }
    events
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
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
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match (key.code, ctrl) {
        (KeyCode::Esc, _) | (KeyCode::Char('c'), true) => return true,
        (KeyCode::Char('n'), true) => {
            let events =
                dispatch_and_notify(state, runtime, view_data, internal_tx, AppCommand::NewSearch);
            if events.contains(&AppEvent::PhaseChanged(LifecyclePhase::Idle)) {
                view_data.input.clear();
            }
        }
        (KeyCode::Char('u'), true) => view_data.input.clear(),
        (KeyCode::Enter, _) => {
            let input = view_data.input.clone();
            dispatch_and_notify(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::Submit(input),
            );
        }
        (KeyCode::Tab, _) => {
            dispatch_and_notify(state, runtime, view_data, internal_tx, AppCommand::NextView);
        }
        (KeyCode::BackTab, _) => {
            dispatch_and_notify(state, runtime, view_data, internal_tx, AppCommand::PrevView);
        }
        (KeyCode::F(number @ 1..=3), _) => {
            let mode = ViewMode::ALL[usize::from(number - 1)];
            dispatch_and_notify(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::SelectView(mode),
            );
        }
        (KeyCode::Up, _) => view_data.scroll = view_data.scroll.saturating_sub(1),
        (KeyCode::Down, _) => {
            view_data.scroll = view_data.scroll.saturating_add(1).min(max_scroll(state));
        }
        (KeyCode::PageUp, _) => view_data.scroll = view_data.scroll.saturating_sub(10),
        (KeyCode::PageDown, _) => {
            view_data.scroll = view_data.scroll.saturating_add(10).min(max_scroll(state));
        }
        (KeyCode::Backspace, _) => {
            view_data.input.pop();
        }
        (KeyCode::Char(ch), false) => view_data.input.push(ch),
        _ => {}
    }
    false
}

// Keeps the last line of the current view reachable and no further.
fn max_scroll(state: &AppState) -> u16 {
    let Some(result) = state.lifecycle.state().result() else {
        return 0;
    };
    let rows = result.row_count();
    let lines = match state.view.current() {
        ViewMode::Table => rows,
        ViewMode::Cards => (rows * (result.columns().len() + 2)).saturating_sub(1),
        ViewMode::Chart => rows + 1,
    };
    u16::try_from(lines.saturating_sub(1)).unwrap_or(u16::MAX)
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

    let input_text = if view_data.input.is_empty() {
        Line::from(Span::styled(
            PROMPT_PLACEHOLDER,
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Line::from(format!("> {}", view_data.input))
    };
    let input = Paragraph::new(input_text).block(
        Block::default()
            .title("Retail Explorer")
            .borders(Borders::ALL),
    );
    frame.render_widget(input, layout[0]);

    match state.lifecycle.state() {
        LifecycleState::Idle => {
            let idle = Paragraph::new("Ask natural language questions about your dataset.")
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(idle, layout[1]);
        }
        LifecycleState::Loading => {
            let loading = Paragraph::new("Running query...")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(loading, layout[1]);
        }
        LifecycleState::Error { message, .. } => {
            let error = Paragraph::new(message.as_str())
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: false })
                .block(Block::default().title("Error").borders(Borders::ALL));
            frame.render_widget(error, layout[1]);
        }
        LifecycleState::Success { result } => {
            let sections = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(5),
                    Constraint::Length(3),
                    Constraint::Min(1),
                ])
                .split(layout[1]);

            let sql = Paragraph::new(result.sql())
                .style(Style::default().fg(Color::Green))
                .wrap(Wrap { trim: false })
                .block(Block::default().title("SQL Query").borders(Borders::ALL));
            frame.render_widget(sql, sections[0]);

            let mode = state.view.current();
            let selected = ViewMode::ALL
                .iter()
                .position(|candidate| *candidate == mode)
                .unwrap_or(0);
            let tabs = Tabs::new(ViewMode::ALL.iter().map(|m| m.label()).collect::<Vec<_>>())
                .block(
                    Block::default()
                        .title(results_summary(result.row_count()))
                        .borders(Borders::ALL),
                )
                .style(Style::default().fg(Color::White))
                .highlight_style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
                .select(selected);
            frame.render_widget(tabs, sections[1]);

            let model = project(result, mode, &view_data.formatter);
            render_model(frame, sections[2], &model, view_data.scroll);
        }
    }

    let status = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);
}

fn render_model(frame: &mut ratatui::Frame<'_>, area: Rect, model: &RenderModel, scroll: u16) {
    let block = Block::default().borders(Borders::ALL);
    match model {
        RenderModel::Empty(_) => {
            frame.render_widget(Paragraph::new(EMPTY_RESULT_TEXT).block(block), area);
        }
        RenderModel::ChartUnavailable(reason) => {
            let text = Paragraph::new(reason.as_str())
                .wrap(Wrap { trim: false })
                .block(block);
            frame.render_widget(text, area);
        }
        RenderModel::Table(table) => {
            let header = Row::new(table.headers.iter().map(|label| {
                Cell::from(label.as_str()).style(
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                )
            }));
            let rows = table
                .rows
                .iter()
                .skip(usize::from(scroll))
                .map(|row| Row::new(row.iter().map(|cell| Cell::from(cell.as_str()))));
            let widths = vec![Constraint::Min(8); table.headers.len().max(1)];
            let widget = Table::new(rows, widths)
                .header(header)
                .column_spacing(1)
                .block(block);
            frame.render_widget(widget, area);
        }
        RenderModel::Cards(cards) => {
            let text = Paragraph::new(render_cards_text(cards))
                .scroll((scroll, 0))
                .block(block);
            frame.render_widget(text, area);
        }
        RenderModel::Chart(chart) => {
            let inner_width = usize::from(area.width.saturating_sub(2));
            let lines = chart_lines(chart, inner_width);
            let text = Paragraph::new(lines).scroll((scroll, 0)).block(block);
            frame.render_widget(text, area);
        }
    }
}

fn chart_lines(chart: &ChartView, width: usize) -> Vec<Line<'static>> {
    let label_width = chart_label_width(chart);
    let value_width = chart
        .bars
        .iter()
        .map(|bar| bar.value_label.chars().count())
        .max()
        .unwrap_or(0);
    let bar_space = width.saturating_sub(label_width + value_width + 4);

    let header = Line::from(Span::styled(
        format!(
            "{:<label_width$} {}",
            truncate_label(&chart.label_header, CHART_LABEL_MAX),
            chart.value_header
        ),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    std::iter::once(header)
        .chain(chart.bars.iter().map(|bar| {
            let (filled, overflow) = bar_cells(bar.fraction, bar_space);
            let (r, g, b) = hsl_to_rgb(bar.hue, 0.8, 0.6);
            let mut spans = vec![
                Span::raw(format!(
                    "{:<label_width$} ",
                    truncate_label(&bar.label, CHART_LABEL_MAX)
                )),
                Span::styled(
                    BAR_GLYPH.repeat(filled),
                    Style::default().fg(Color::Rgb(r, g, b)),
                ),
            ];
            if overflow {
                spans.push(Span::styled(
                    OVERFLOW_MARK,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ));
            }
            spans.push(Span::raw(format!(" {}", bar.value_label)));
            Line::from(spans)
        }))
        .collect()
}

fn chart_label_width(chart: &ChartView) -> usize {
    chart
        .bars
        .iter()
        .map(|bar| bar.label.as_str())
        .chain(std::iter::once(chart.label_header.as_str()))
        .map(|label| label.chars().count().min(CHART_LABEL_MAX))
        .max()
        .unwrap_or(0)
}

/// Cells to fill for a bar. Fractions above 1.0 fill the whole track and
/// set the overflow flag; the fraction itself is left alone.
fn bar_cells(fraction: f64, width: usize) -> (usize, bool) {
    if !fraction.is_finite() || fraction <= 0.0 {
        return (0, false);
    }
    if fraction > 1.0 {
        return (width, true);
    }
    let filled = (fraction * width as f64).round() as usize;
    (filled.min(width), false)
}

fn hsl_to_rgb(hue: u16, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = f64::from(hue % 360) / 60.0;
    let second = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u8 {
        0 => (chroma, second, 0.0),
        1 => (second, chroma, 0.0),
        2 => (0.0, chroma, second),
        3 => (0.0, second, chroma),
        4 => (second, 0.0, chroma),
        _ => (chroma, 0.0, second),
    };
    let offset = lightness - chroma / 2.0;
    let channel = |value: f64| ((value + offset) * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r), channel(g), channel(b))
}

fn truncate_label(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let mut out: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn status_text(state: &AppState) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }
    match state.lifecycle.state() {
        LifecycleState::Success { .. } => {
            "enter search | tab/F1-F3 view | up/down scroll | ctrl+n new search | esc quit"
                .to_owned()
        }
        LifecycleState::Error { .. } => "enter retry | ctrl+n new search | esc quit".to_owned(),
        LifecycleState::Idle | LifecycleState::Loading => {
            "enter search | ctrl+u clear | esc quit".to_owned()
        }
    }
}

pub fn results_summary(row_count: usize) -> String {
    if row_count == 1 {
        "1 row found".to_owned()
    } else {
        format!("{row_count} rows found")
    }
}

pub fn render_plain(model: &RenderModel, width: usize) -> String {
    match model {
        RenderModel::Empty(_) => format!("{EMPTY_RESULT_TEXT}\n"),
        RenderModel::ChartUnavailable(reason) => format!("{reason}\n"),
        RenderModel::Table(table) => render_table_text(table),
        RenderModel::Cards(cards) => render_cards_text(cards),
        RenderModel::Chart(chart) => {
            let mut out = String::new();
            for line in chart_lines(chart, width) {
                for span in line.spans {
                    out.push_str(&span.content);
                }
                out.push('\n');
            }
            out
        }
    }
}

fn render_table_text(table: &TableView) -> String {
    let mut widths: Vec<usize> = table
        .headers
        .iter()
        .map(|header| header.chars().count())
        .collect();
    for row in &table.rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let format_row = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_owned()
    };

    let mut out = String::new();
    out.push_str(&format_row(&table.headers));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in &table.rows {
        out.push_str(&format_row(row));
        out.push('\n');
    }
    out
}

fn render_cards_text(cards: &[Card]) -> String {
    let mut out = String::new();
    for (index, card) in cards.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!("#{}\n", index + 1));
        for field in &card.fields {
            out.push_str(&format!("  {}: {}\n", field.label, field.value));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, PROMPT_PLACEHOLDER, ViewData, bar_cells, handle_key_event,
        hsl_to_rgb, process_internal_events, render, render_plain, results_summary, status_text,
        truncate_label,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use explorer_app::{
        AppState, Card, CardField, CellFormatter, CellValue, ChartBar, ChartView, LifecyclePhase,
        QueryOutcome, QueryResult, QueryTicket, RenderModel, TRANSPORT_FAILURE_MESSAGE,
        TableView, ViewMode,
    };
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::style::Color;
    use std::collections::VecDeque;
    use std::sync::mpsc;

    #[derive(Debug, Default)]
    struct TestRuntime {
        questions: Vec<String>,
        tickets: Vec<QueryTicket>,
        replies: VecDeque<QueryOutcome>,
        fail_spawn: bool,
    }

    impl AppRuntime for TestRuntime {
        fn run_query(&mut self, question: &str) -> QueryOutcome {
            self.questions.push(question.to_owned());
            self.replies
                .pop_front()
                .unwrap_or_else(|| QueryOutcome::TransportFailure("no reply scripted".to_owned()))
        }

        fn spawn_query(
            &mut self,
            ticket: &QueryTicket,
            _tx: mpsc::Sender<InternalEvent>,
        ) -> anyhow::Result<()> {
            if self.fail_spawn {
                anyhow::bail!("thread pool exhausted");
            }
            self.questions.push(ticket.query.clone());
            self.tickets.push(ticket.clone());
            Ok(())
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_text(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        text: &str,
    ) {
        for ch in text.chars() {
            handle_key_event(state, runtime, view_data, tx, key(KeyCode::Char(ch)));
        }
    }

    fn sample_result() -> QueryResult {
        QueryResult::new(
            "SELECT country, revenue FROM t",
            vec!["country".to_owned(), "revenue".to_owned()],
            vec![
                vec![CellValue::from("UK"), CellValue::Number(100000.0)],
                vec![CellValue::from("France"), CellValue::Number(50000.0)],
            ],
        )
        .expect("valid result")
    }

    fn resolve(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
        ticket: &QueryTicket,
        outcome: QueryOutcome,
    ) {
        tx.send(InternalEvent::QueryResolved {
            request_id: ticket.request_id,
            outcome,
        })
        .expect("send");
        process_internal_events(state, runtime, view_data, tx, rx);
    }

    fn draw(state: &AppState, view_data: &ViewData) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("test terminal");
        terminal
            .draw(|frame| render(frame, state, view_data))
            .expect("draw");
        terminal.backend().buffer().clone()
    }

    fn screen_text(buffer: &Buffer) -> String {
        let width = usize::from(buffer.area.width);
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn submitted(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        question: &str,
    ) -> QueryTicket {
        type_text(state, runtime, view_data, tx, question);
        handle_key_event(state, runtime, view_data, tx, key(KeyCode::Enter));
        runtime.tickets.last().cloned().expect("query dispatched")
    }

    #[test]
    fn enter_submits_trimmed_input() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, _rx) = mpsc::channel();

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "  top customers ");
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));

        assert_eq!(runtime.questions, vec!["top customers"]);
        assert_eq!(state.lifecycle.phase(), LifecyclePhase::Loading);
    }

    #[test]
    fn enter_on_blank_input_does_nothing() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, _rx) = mpsc::channel();

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "   ");
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));

        assert!(runtime.questions.is_empty());
        assert_eq!(state.lifecycle.phase(), LifecyclePhase::Idle);
    }

    #[test]
    fn error_shows_one_toast() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "q");
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));
        let ticket = runtime.tickets[0].clone();
        resolve(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &ticket,
            QueryOutcome::TransportFailure("refused".to_owned()),
        );

        assert_eq!(state.status_line.as_deref(), Some(TRANSPORT_FAILURE_MESSAGE));
        assert_eq!(view_data.status_token, 1);

        // Unrelated keys re-run the bridge; the same error must not toast again.
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Tab));
        assert_eq!(view_data.status_token, 1);
    }

    #[test]
    fn superseded_reply_is_ignored() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "first");
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));
        let first = runtime.tickets[0].clone();
        let second = runtime.tickets[1].clone();

        resolve(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &second,
            QueryOutcome::Success(sample_result()),
        );
        resolve(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &first,
            QueryOutcome::ServiceError("too late".to_owned()),
        );

        assert_eq!(state.lifecycle.phase(), LifecyclePhase::Success);
        assert!(state.status_line.is_none());
    }

    #[test]
    fn spawn_failure_lands_in_error() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime {
            fail_spawn: true,
            ..TestRuntime::default()
        };
        let mut view_data = ViewData::default();
        let (tx, _rx) = mpsc::channel();

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "q");
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));

        assert_eq!(
            state.lifecycle.state().error_message(),
            Some(TRANSPORT_FAILURE_MESSAGE)
        );
        assert_eq!(state.status_line.as_deref(), Some(TRANSPORT_FAILURE_MESSAGE));
    }

    #[test]
    fn default_spawn_reports_through_channel() {
        struct Immediate;
        impl AppRuntime for Immediate {
            fn run_query(&mut self, _question: &str) -> QueryOutcome {
                QueryOutcome::ServiceError("Empty query".to_owned())
            }
        }

        let mut state = AppState::default();
        let mut runtime = Immediate;
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();

        view_data.input = "q".to_owned();
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));
        assert_eq!(state.lifecycle.phase(), LifecyclePhase::Loading);

        process_internal_events(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert_eq!(state.lifecycle.state().error_message(), Some("Empty query"));
    }

    #[test]
    fn ctrl_n_resets_and_clears_input() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();

        type_text(&mut state, &mut runtime, &mut view_data, &tx, "q");
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));
        let ticket = runtime.tickets[0].clone();
        resolve(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &ticket,
            QueryOutcome::Success(sample_result()),
        );

        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, ctrl('n'));
        assert_eq!(state.lifecycle.phase(), LifecyclePhase::Idle);
        assert!(state.lifecycle.state().result().is_none());
        assert!(view_data.input.is_empty());
    }

    #[test]
    fn view_keys_switch_modes() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, _rx) = mpsc::channel();

        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::F(3)));
        assert_eq!(state.view.current(), ViewMode::Chart);
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Tab));
        assert_eq!(state.view.current(), ViewMode::Table);
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::BackTab));
        assert_eq!(state.view.current(), ViewMode::Chart);
    }

    #[test]
    fn escape_and_ctrl_c_quit() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, _rx) = mpsc::channel();

        assert!(handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Esc)));
        assert!(handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, ctrl('c')));
        assert!(!handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('c'))
        ));
    }

    #[test]
    fn stale_status_clear_token_is_ignored() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData {
            status_token: 2,
            ..ViewData::default()
        };
        let (tx, rx) = mpsc::channel();
        state.status_line = Some("latest".to_owned());

        tx.send(InternalEvent::ClearStatus { token: 1 }).expect("send");
        process_internal_events(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert_eq!(state.status_line.as_deref(), Some("latest"));

        tx.send(InternalEvent::ClearStatus { token: 2 }).expect("send");
        process_internal_events(&mut state, &mut runtime, &mut view_data, &tx, &rx);
        assert!(state.status_line.is_none());
    }

    #[test]
    fn bar_cells_clamp_for_display_only() {
        assert_eq!(bar_cells(1.0, 20), (20, false));
        assert_eq!(bar_cells(0.5, 20), (10, false));
        assert_eq!(bar_cells(2.0, 20), (20, true));
        assert_eq!(bar_cells(0.0, 20), (0, false));
        assert_eq!(bar_cells(f64::NAN, 20), (0, false));
    }

    #[test]
    fn hsl_conversion_matches_reference_hue() {
        assert_eq!(hsl_to_rgb(210, 0.8, 0.6), (71, 153, 235));
        assert_eq!(hsl_to_rgb(0, 0.0, 1.0), (255, 255, 255));
    }

    #[test]
    fn plain_table_aligns_columns() {
        let model = RenderModel::Table(TableView {
            headers: vec!["Country".to_owned(), "Revenue".to_owned()],
            rows: vec![
                vec!["UK".to_owned(), "100000".to_owned()],
                vec!["France".to_owned(), "50000".to_owned()],
            ],
        });
        assert_eq!(
            render_plain(&model, 80),
            "Country | Revenue\n--------+--------\nUK      | 100000\nFrance  | 50000\n"
        );
    }

    #[test]
    fn plain_cards_list_fields() {
        let model = RenderModel::Cards(vec![Card {
            fields: vec![
                CardField {
                    label: "Customer Id".to_owned(),
                    value: "12346".to_owned(),
                },
                CardField {
                    label: "Total Spent".to_owned(),
                    value: "$77,183.60".to_owned(),
                },
            ],
        }]);
        assert_eq!(
            render_plain(&model, 80),
            "#1\n  Customer Id: 12346\n  Total Spent: $77,183.60\n"
        );
    }

    #[test]
    fn plain_chart_draws_proportional_bars() {
        let chart = ChartView {
            label_header: "Country".to_owned(),
            value_header: "Revenue".to_owned(),
            bars: vec![
                ChartBar {
                    label: "UK".to_owned(),
                    fraction: 1.0,
                    value_label: "100".to_owned(),
                    hue: 210,
                },
                ChartBar {
                    label: "FR".to_owned(),
                    fraction: 0.5,
                    value_label: "50".to_owned(),
                    hue: 225,
                },
            ],
        };
        // 7 label + 3 value + 4 padding leaves a 10 cell track.
        let text = render_plain(&RenderModel::Chart(chart), 24);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Country Revenue");
        assert_eq!(lines[1], format!("UK      {} 100", "█".repeat(10)));
        assert_eq!(lines[2], format!("FR      {} 50", "█".repeat(5)));
    }

    #[test]
    fn idle_screen_shows_prompt() {
        let text = screen_text(&draw(&AppState::default(), &ViewData::default()));
        assert!(text.contains("Retail Explorer"));
        assert!(text.contains(PROMPT_PLACEHOLDER));
        assert!(text.contains("Ask natural language questions about your dataset."));
        assert!(!text.contains("SQL Query"));
    }

    #[test]
    fn loading_screen_shows_progress() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, _rx) = mpsc::channel();

        submitted(&mut state, &mut runtime, &mut view_data, &tx, "top countries");
        let text = screen_text(&draw(&state, &view_data));
        assert!(text.contains("> top countries"));
        assert!(text.contains("Running query..."));
    }

    #[test]
    fn error_screen_shows_message_in_red() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();

        let ticket = submitted(&mut state, &mut runtime, &mut view_data, &tx, "q");
        resolve(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &ticket,
            QueryOutcome::ServiceError("syntax error near LIMT".to_owned()),
        );

        let buffer = draw(&state, &view_data);
        let text = screen_text(&buffer);
        assert!(text.contains("Error"));
        assert!(text.contains("syntax error near LIMT"));
        assert!(
            buffer
                .content()
                .iter()
                .any(|cell| cell.symbol() == "L" && cell.fg == Color::Red)
        );
        assert!(!text.contains("SQL Query"));
    }

    #[test]
    fn success_screen_clears_on_new_search() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();

        let ticket = submitted(&mut state, &mut runtime, &mut view_data, &tx, "q");
        resolve(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &ticket,
            QueryOutcome::Success(sample_result()),
        );

        let text = screen_text(&draw(&state, &view_data));
        assert!(text.contains("SELECT country"));
        assert!(text.contains("2 rows found"));
        assert!(text.contains("France"));

        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, ctrl('n'));
        let text = screen_text(&draw(&state, &view_data));
        assert!(!text.contains("SELECT country"));
        assert!(!text.contains("2 rows found"));
        assert!(text.contains(PROMPT_PLACEHOLDER));
    }

    #[test]
    fn unsorted_chart_marks_overflowing_bar() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();

        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::F(3)));
        let ticket = submitted(&mut state, &mut runtime, &mut view_data, &tx, "q");
        let unsorted = QueryResult::new(
            "SELECT name, amount FROM t",
            vec!["name".to_owned(), "amount".to_owned()],
            vec![
                vec![CellValue::from("A"), CellValue::Number(50.0)],
                vec![CellValue::from("B"), CellValue::Number(100.0)],
            ],
        )
        .expect("valid result");
        resolve(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &ticket,
            QueryOutcome::Success(unsorted),
        );

        let text = screen_text(&draw(&state, &view_data));
        assert!(text.contains("Name Amount"));
        let overflow_row = text
            .lines()
            .find(|line| line.contains("│B "))
            .expect("bar for B");
        assert!(overflow_row.contains("█>"));
        let first_row = text
            .lines()
            .find(|line| line.contains("│A "))
            .expect("bar for A");
        assert!(!first_row.contains('>'));
    }

    #[test]
    fn ctrl_n_while_loading_keeps_input() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, _rx) = mpsc::channel();

        submitted(&mut state, &mut runtime, &mut view_data, &tx, "top countries");
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, ctrl('n'));

        assert_eq!(state.lifecycle.phase(), LifecyclePhase::Loading);
        assert_eq!(view_data.input, "top countries");
    }

    #[test]
    fn scroll_stops_at_last_row() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::default();
        let (tx, rx) = mpsc::channel();

        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Down));
        assert_eq!(view_data.scroll, 0);

        let ticket = submitted(&mut state, &mut runtime, &mut view_data, &tx, "q");
        resolve(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &ticket,
            QueryOutcome::Success(sample_result()),
        );
        for _ in 0..5 {
            handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Down));
        }
        assert_eq!(view_data.scroll, 1);
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::PageDown));
        assert_eq!(view_data.scroll, 1);

        // Cards: two cards of three lines plus a blank separator.
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::F(2)));
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::PageDown));
        assert_eq!(view_data.scroll, 6);
    }

    #[test]
    fn plain_empty_state() {
        assert_eq!(
            render_plain(&RenderModel::Empty(ViewMode::Chart), 80),
            "No rows returned.\n"
        );
    }

    #[test]
    fn summary_and_status_text() {
        assert_eq!(results_summary(1), "1 row found");
        assert_eq!(results_summary(0), "0 rows found");
        assert_eq!(results_summary(12), "12 rows found");

        let mut state = AppState::default();
        assert!(status_text(&state).contains("enter search"));
        state.status_line = Some("toast".to_owned());
        assert_eq!(status_text(&state), "toast");
    }

    #[test]
    fn long_labels_are_truncated() {
        assert_eq!(truncate_label("short", 10), "short");
        assert_eq!(truncate_label("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn formatter_is_used_for_view_data() {
        let view_data = ViewData::new(CellFormatter::new(["revenue"], Default::default()));
        assert!(view_data.formatter.is_money_column("revenue"));
    }
}
