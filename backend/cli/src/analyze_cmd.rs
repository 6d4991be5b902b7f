//! `tuvi analyze`: run a full reading in the terminal, then take follow-up
//! questions until `/quit` or end of input.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use tuvi_agent::{AppState, ChartFlow, TurnOutcome};
use tuvi_config::TuviConfig;
use tuvi_core::{ChartImage, Language, Step};
use tuvi_report::{IrParser, ReadingReport, Renderer, ReportExporter};

use crate::runtime;
use crate::terminal_output::{
    note_error, note_info, note_success, note_warn, profile_table, stream_write, styled, BOLD,
    DIM, RESET,
};
use crate::ProfileArgs;

#[derive(Debug, Default)]
pub struct AnalyzeOptions {
    pub autofill: bool,
    pub export: Option<PathBuf>,
    pub no_chat: bool,
}

/// A line typed at the consultation prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Question(&'a str),
    Export(Option<&'a str>),
    Data,
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Question(line);
    };
    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (command, None),
    };
    match name {
        "export" => Input::Export(rest),
        "data" => Input::Data,
        "reset" => Input::Reset,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(name),
    }
}

pub async fn run(
    config: &TuviConfig,
    image_path: &Path,
    args: &ProfileArgs,
    options: AnalyzeOptions,
) -> Result<()> {
    let profile = runtime::resolve_profile(runtime::base_profile(config), args).await?;
    let image = ChartImage::read_file(image_path).await?;
    let flow = ChartFlow::new(runtime::build_gateway(config)?, &runtime::flow_settings(config));

    let mut state = AppState::new(profile);
    if options.autofill {
        state = flow.autofill(&state, image.clone()).await?;
    }
    state = read_chart(&flow, &state, &image).await?;
    print_reading(&state);

    if let Some(path) = &options.export {
        export(&state, Some(path.as_path())).await?;
    }
    if options.no_chat {
        return Ok(());
    }

    let language = state.profile.language;
    note_info(match language {
        Language::Vi => "Hỏi thêm về lá số. /help để xem lệnh, /quit để thoát.",
        Language::En => "Ask about your chart. /help for commands, /quit to leave.",
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    loop {
        stream_write(&mut stdout, &styled(format!("{BOLD}> {RESET}")))?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Question(text) => match flow.ask(&state, text).await {
                Ok(TurnOutcome::Answered(reply)) => {
                    println!("\n{}", render_markdown(&reply.text));
                }
                Ok(TurnOutcome::Rejected(reason)) => debug!(?reason, "Question not sent"),
                Err(e) => note_error(&e.to_string()),
            },
            Input::Export(path) => {
                if let Err(e) = export(&state, path.map(Path::new)).await {
                    note_error(&format!("{e:#}"));
                }
            }
            Input::Data => {
                let snapshot = state.snapshot().await;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Input::Reset => {
                state = flow.reset(&state)?;
                note_info("Starting a fresh reading of the same chart");
                state = read_chart(&flow, &state, &image).await?;
                print_reading(&state);
            }
            Input::Help => print_help(),
            Input::Quit => break,
            Input::Unknown(name) => note_warn(&format!("Unknown command /{name}. Try /help")),
        }
    }
    Ok(())
}

/// Drive FORM through to RESULT, failing with the flow's notice.
async fn read_chart(flow: &ChartFlow, state: &AppState, image: &ChartImage) -> Result<AppState> {
    note_info("Analysing chart, this can take a few minutes...");
    let mut next = flow.submit(state).await?;
    if next.step() == Step::Upload && next.captured_image.is_none() {
        next = flow.confirm_image(&next, image.clone()).await?;
    }
    if next.step() != Step::Result {
        let notice = next.notice.clone().unwrap_or_else(|| "Analysis failed".to_string());
        bail!(notice);
    }
    Ok(next)
}

fn print_reading(state: &AppState) {
    let Some(analysis) = state.analysis() else {
        return;
    };
    println!("\n{}", styled(profile_table(&state.profile)));
    println!("{}", render_markdown(&analysis.interpretation));
}

fn render_markdown(markdown: &str) -> String {
    styled(Renderer::to_ansi(&IrParser::parse(markdown)))
}

/// Write the reading and its consultation; without a path the file is
/// named after the person and view year.
async fn export(state: &AppState, path: Option<&Path>) -> Result<()> {
    let Some(session) = state.consultation() else {
        bail!("No reading to export");
    };
    let report = ReadingReport::new(
        state.profile.clone(),
        session.context().analysis().clone(),
        session.transcript().await,
    )
    .with_chart(state.captured_image.clone());
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(ReportExporter::default_file_name(&report)));
    let written = ReportExporter::export(&report, &path)
        .await
        .with_context(|| format!("Failed to export report to {}", path.display()))?;
    note_success(&format!("Report written to {}", written.display()));
    Ok(())
}

fn print_help() {
    println!(
        "{}",
        styled(format!(
            "  {BOLD}/export [path]{RESET}  {DIM}save the reading and chat (.md or .html){RESET}\n\
             \x20 {BOLD}/data{RESET}           {DIM}print the session as JSON{RESET}\n\
             \x20 {BOLD}/reset{RESET}          {DIM}discard this reading and analyse again{RESET}\n\
             \x20 {BOLD}/quit{RESET}           {DIM}leave{RESET}"
        ))
    );
}
