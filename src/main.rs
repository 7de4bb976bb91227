use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use feedscope_logs::{ConsoleConfig, LogConsole, LogSource, LogStreamManager, Row};

mod render;

/// Feedscope - an interactive log console with filtering, grouping and search
#[derive(Parser, Debug)]
#[command(name = "feedscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log file to read (stdin when omitted or "-")
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Config file (defaults to <config dir>/feedscope/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Keep reading new lines as the file grows
    #[arg(short, long)]
    follow: bool,

    /// Maximum number of entries kept
    #[arg(long)]
    max_entries: Option<usize>,

    /// Fixed row height used for windowing
    #[arg(long)]
    row_height: Option<f64>,

    /// Do not insert time gap markers
    #[arg(long)]
    no_gaps: bool,

    /// Do not collapse hidden entries into groups
    #[arg(long)]
    no_groups: bool,

    /// Expand every hidden-entry group
    #[arg(long)]
    expand_groups: bool,

    /// Hide a layer (repeatable)
    #[arg(long = "hide-layer", value_name = "LAYER")]
    hide_layers: Vec<String>,

    /// Hide a tag (repeatable)
    #[arg(long = "hide-tag", value_name = "TAG")]
    hide_tags: Vec<String>,

    /// Search query
    #[arg(short, long)]
    search: Option<String>,

    /// Match the search query case-sensitively
    #[arg(long)]
    case_sensitive: bool,

    /// Number of rows in the view
    #[arg(long, default_value = "40")]
    rows: usize,

    /// Scroll offset in rows from the top (default: stick to bottom)
    #[arg(long)]
    scroll: Option<usize>,

    /// Print view rows as JSON lines
    #[arg(long)]
    json: bool,

    /// Export the whole store instead of printing the view
    #[arg(long, value_enum, value_name = "FORMAT")]
    export: Option<ExportFormat>,

    /// Refresh interval in milliseconds when following
    #[arg(long, default_value = "250")]
    tick_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    /// Plain messages, one per line
    Raw,
    /// Time, label and message with gap rows
    Rows,
    /// One JSON object per row
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the view, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

fn load_config(args: &Args) -> Result<ConsoleConfig> {
    let mut config =
        ConsoleConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(max_entries) = args.max_entries {
        anyhow::ensure!(max_entries > 0, "--max-entries must be at least 1");
        config.max_entries = max_entries;
    }
    if let Some(row_height) = args.row_height {
        anyhow::ensure!(row_height > 0.0, "--row-height must be positive");
        config.row_height = row_height;
    }
    if args.no_gaps {
        config.gaps.enabled = false;
    }
    if args.no_groups {
        config.hidden_groups = false;
    }

    Ok(config)
}

fn source(args: &Args) -> LogSource {
    match &args.file {
        Some(path) if path.as_os_str() != "-" => LogSource::File {
            path: path.clone(),
            follow: args.follow,
        },
        _ => LogSource::Stdin,
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let row_height = config.row_height;

    let name = args
        .file
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Console".to_string());

    let mut console = LogConsole::new(name, config);
    console.set_viewport_height(args.rows as f64 * row_height);
    for layer in &args.hide_layers {
        console.set_layer_visible(layer, false);
    }
    for tag in &args.hide_tags {
        console.set_tag_visible(tag, false);
    }

    let mut streams = LogStreamManager::new();
    streams.start(source(&args), console.buffer().clone());

    let following = args.follow && args.export.is_none();
    if !following {
        let lines = streams.wait().await.context("Failed to read log input")?;
        tracing::debug!(lines, "Input finished");

        prepare_view(&mut console, &args);
        if let Some(format) = args.export {
            return export(&console, format);
        }
        return print_view(&mut console, &args);
    }

    console.set_case_sensitive(args.case_sensitive);
    if let Some(query) = &args.search {
        console.set_query(query);
    }

    let mut tick = tokio::time::interval(Duration::from_millis(args.tick_ms.max(10)));
    let mut last_version = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tick.tick() => {
                console.rebuild();
                if last_version != Some(console.projection_version()) {
                    last_version = Some(console.projection_version());
                    print_view(&mut console, &args)?;
                }
            }
        }
    }

    streams.stop();
    Ok(())
}

/// Apply search and grouping options once the input is in
fn prepare_view(console: &mut LogConsole, args: &Args) {
    console.rebuild();

    if args.expand_groups {
        let groups: Vec<u64> = console
            .rows()
            .iter()
            .filter_map(|row| match row {
                Row::GroupStart(group) => Some(group.first_entry_id),
                _ => None,
            })
            .collect();
        for first_entry_id in groups {
            console.set_group_expanded(first_entry_id, true);
        }
        console.rebuild();
    }

    if let Some(offset) = args.scroll {
        console.scroll_to(offset as f64 * console.viewport().row_height());
        console.rebuild();
    }

    // Focus lands on the first match after the view settles
    console.set_case_sensitive(args.case_sensitive);
    if let Some(query) = &args.search {
        console.set_query(query);
    }
}

fn print_view(console: &mut LogConsole, args: &Args) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if args.json {
        render::write_json(&mut out, console)?;
    } else {
        let ansi = std::io::stdout().is_terminal();
        render::write_text(&mut out, console, ansi)?;
    }
    out.flush()?;
    Ok(())
}

fn export(console: &LogConsole, format: ExportFormat) -> Result<()> {
    let text = match format {
        ExportFormat::Raw => console.export_raw(),
        ExportFormat::Rows => console
            .export_rows()
            .iter()
            .map(|row| row.to_line())
            .collect::<Vec<_>>()
            .join("\n"),
        ExportFormat::Json => feedscope_logs::export_json_lines(&console.export_rows())?,
    };

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", text)?;
    Ok(())
}
