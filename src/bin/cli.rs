//! Binary entry point for the stemma history CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rustc_hash::FxHashSet;
use serde_json::Value;
use stemma::client::records_from_payload;
use stemma::{
    display, record, FetchOptions, HistoryClient, HistoryError, HistoryGraph, VersionSummary,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "stemma",
    version,
    about = "Inspect the version history of lineage-tracked documents",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_name = "FIELD",
        help = "Record field to prefer when deriving display labels"
    )]
    label_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct FetchCmd {
    #[arg(value_name = "URI", help = "Document URI containing an /id/ segment")]
    document_uri: String,

    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 30,
        env = "STEMMA_TIMEOUT_SECS",
        help = "HTTP timeout for each store request"
    )]
    timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Fetch a document's history from its store and print the version tree")]
    Fetch(FetchCmd),

    #[command(about = "Print the version tree for records in a local JSON file")]
    Tree {
        #[arg(value_name = "FILE")]
        records: PathBuf,
    },

    #[command(about = "Show one version's place in the tree")]
    Inspect {
        #[arg(value_name = "FILE")]
        records: PathBuf,

        #[arg(value_name = "ID")]
        id: String,
    },

    #[command(about = "List a summary line for every version")]
    Summaries {
        #[arg(value_name = "FILE")]
        records: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let label_key = cli.label_key.as_deref();

    match &cli.command {
        Command::Fetch(cmd) => {
            let options = FetchOptions {
                timeout: Duration::from_secs(cmd.timeout_secs),
                ..FetchOptions::default()
            };
            let client = HistoryClient::new(options)?;
            let graph = client.fetch_graph(&cmd.document_uri).await?;
            emit(&cli.format, &graph, || print_tree_text(&graph, label_key))?;
        }
        Command::Tree { records } => {
            let graph = HistoryGraph::build(&load_records(records)?);
            emit(&cli.format, &graph, || print_tree_text(&graph, label_key))?;
        }
        Command::Inspect { records, id } => {
            let graph = HistoryGraph::build(&load_records(records)?);
            let summary = graph
                .summary(id, label_key)
                .ok_or_else(|| format!("unknown version id '{id}'"))?;
            emit(&cli.format, &summary, || print_summary_text(&summary))?;
        }
        Command::Summaries { records } => {
            let graph = HistoryGraph::build(&load_records(records)?);
            let list = graph.summaries(label_key);
            emit(&cli.format, &list, || print_summary_lines(&list))?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Accepts either a bare array of records or a store payload object with an
// `items`/`history` collection, so saved endpoint responses work unchanged.
fn load_records(path: &Path) -> stemma::Result<Vec<Value>> {
    let text = fs::read_to_string(path)?;
    let payload: Value = serde_json::from_str(&text)?;
    records_from_payload(payload, "history")
        .ok_or(HistoryError::UnexpectedFormat("records file is not a record collection"))
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_tree_text(graph: &HistoryGraph, label_key: Option<&str>) {
    if graph.is_empty() {
        println!("no versions");
        return;
    }
    let now = display::now_millis();
    if graph.roots().is_empty() {
        println!("no entry points; listing {} versions", graph.len());
        for (id, rec) in graph.nodes() {
            println!("- {}", node_line(id, rec, label_key, now));
        }
        return;
    }
    let mut ancestors = FxHashSet::default();
    for root in graph.roots() {
        print_subtree(graph, root, 0, label_key, now, &mut ancestors);
    }
}

// `ancestors` holds the ids on the current recursion path, so a repeat is
// a genuine back-edge; a version shared between parents renders under
// each of them.
fn print_subtree(
    graph: &HistoryGraph,
    id: &str,
    depth: usize,
    label_key: Option<&str>,
    now: i64,
    ancestors: &mut FxHashSet<String>,
) {
    let Some(rec) = graph.node(id) else { return };
    let indent = "  ".repeat(depth);
    if !ancestors.insert(id.to_owned()) {
        let label = display::label_for(id, rec, label_key);
        println!("{indent}{label} <{id}> (cycle)");
        return;
    }
    println!("{indent}{}", node_line(id, rec, label_key, now));
    for child in graph.children_of(id) {
        print_subtree(graph, child, depth + 1, label_key, now, ancestors);
    }
    ancestors.remove(id);
}

fn node_line(id: &str, rec: &Value, label_key: Option<&str>, now: i64) -> String {
    let label = display::label_for(id, rec, label_key);
    let age = display::format_time_ago(record::effective_timestamp(rec), now);
    if age.is_empty() {
        format!("{label} <{id}>")
    } else {
        format!("{label} <{id}> ({age})")
    }
}

fn print_summary_text(summary: &VersionSummary<'_>) {
    println!("id:       {}", summary.id);
    println!("label:    {}", summary.label);
    println!("parent:   {}", summary.parent.unwrap_or("-"));
    if summary.children.is_empty() {
        println!("children: -");
    } else {
        println!("children: {}", summary.children.join(", "));
    }
}

fn print_summary_lines(list: &[VersionSummary<'_>]) {
    for summary in list {
        println!(
            "{}: label={:?} parent={} children={}",
            summary.id,
            summary.label,
            summary.parent.unwrap_or("-"),
            summary.children.len()
        );
    }
}
