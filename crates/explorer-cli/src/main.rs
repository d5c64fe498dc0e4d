// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use explorer_app::{
    AppCommand, AppEvent, AppState, CellFormatter, LifecycleState, ViewMode, project,
};
use explorer_client::Client;
use explorer_tui::{AppRuntime, render_plain, results_summary};
use runtime::ClientRuntime;
use std::env;
use std::path::PathBuf;
use tracing::info;

const PLAIN_OUTPUT_WIDTH: usize = 80;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `explorer --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let formatter = config.cell_formatter()?;
    let view = match options.view {
        Some(view) => view,
        None => config.default_view()?,
    };
    let client = Client::new(&config.service_url(), config.service_timeout()?)
        .with_context(|| {
            format!(
                "invalid [service] config in {}; fix url/timeout values or set EXPLORER_SERVICE_URL",
                options.config_path.display()
            )
        })?;
    if options.check_only {
        return Ok(());
    }

    let log_path = config.log_path()?;
    logging::init(&log_path, config.log_level())?;
    info!(url = client.url(), view = view.as_str(), "starting");

    let mut runtime = ClientRuntime::new(client);
    if let Some(question) = &options.query {
        print!("{}", run_one_shot(&mut runtime, question, view, &formatter)?);
        return Ok(());
    }

    let mut state = AppState::with_view(view);
    explorer_tui::run_app(&mut state, &mut runtime, formatter)
}

fn run_one_shot<R: AppRuntime>(
    runtime: &mut R,
    question: &str,
    view: ViewMode,
    formatter: &CellFormatter,
) -> Result<String> {
    let mut state = AppState::with_view(view);
    let ticket = state
        .dispatch(AppCommand::Submit(question.to_owned()))
        .into_iter()
        .find_map(|event| match event {
            AppEvent::RequestDispatched(ticket) => Some(ticket),
            _ => None,
        })
        .ok_or_else(|| anyhow!("--query requires a non-empty question"))?;

    let outcome = runtime.run_query(&ticket.query);
    state.dispatch(AppCommand::Resolve {
        request_id: ticket.request_id,
        outcome,
    });

    match state.lifecycle.state() {
        LifecycleState::Success { result } => {
            let model = project(result, state.view.current(), formatter);
            Ok(format!(
                "SQL: {}\n{}\n\n{}",
                result.sql(),
                results_summary(result.row_count()),
                render_plain(&model, PLAIN_OUTPUT_WIDTH)
            ))
        }
        LifecycleState::Error { message, .. } => bail!("{message}"),
        LifecycleState::Idle | LifecycleState::Loading => {
            bail!("query finished without a result")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    query: Option<String>,
    view: Option<ViewMode>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        query: None,
        view: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--query" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--query requires a question"))?;
                options.query = Some(value.as_ref().to_owned());
            }
            "--view" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--view requires one of: table, cards, chart"))?;
                options.view = Some(config::parse_view(value.as_ref())?);
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("explorer: ask questions about the retail dataset");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and service settings, then exit");
    println!("  --query <text>           Run one question and print the answer");
    println!("  --view <mode>            Start in table, cards, or chart view");
    println!("  --help                   Show this help");
}
