//! `ovsdb-bench`: drive transactional CRUD load against an OVSDB server.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ovsdb_bench::config::{DEFAULT_DATABASE, DEFAULT_TABLE};
use ovsdb_bench::harness::{self, HarnessConfig};
use ovsdb_bench::{BenchTarget, ClientConfig, OpKind};
use ovsdb_client::{JsonRpcConnector, JsonRpcSession, DEFAULT_MAX_FRAME_BYTES};

/// CLI entry point wrapper.
#[derive(Parser, Debug)]
#[command(name = "ovsdb-bench")]
#[command(about = "Transaction throughput and latency benchmark for OVSDB", long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark.
    Run(RunArgs),
    /// Connect and list the databases the server hosts.
    Probe(ProbeArgs),
}

/// CLI options for a benchmark run.
#[derive(Parser, Debug, Clone)]
struct RunArgs {
    /// Operation issued on every request: insert, select, update, mutate or delete.
    #[arg(value_name = "OP")]
    op: Option<String>,

    /// Server address: `tcp:HOST:PORT`, `unix:PATH` or `HOST:PORT`.
    #[arg(long, default_value = "tcp:127.0.0.1:6641")]
    server: String,

    /// Number of concurrent clients (each client uses one connection).
    #[arg(long, default_value_t = 1)]
    clients: usize,

    /// Total runtime for the measured phase.
    #[arg(long, default_value = "10s")]
    duration: humantime::Duration,

    /// Stop each client after this many requests.
    #[arg(long)]
    requests: Option<u64>,

    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,

    #[arg(long, default_value = DEFAULT_TABLE)]
    table: String,

    /// Random seed for row selection (0 picks a random seed).
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Per-transaction timeout (network + server response).
    #[arg(long, default_value = "10s")]
    op_timeout: humantime::Duration,

    /// Write a JSON report to this path.
    #[arg(long)]
    report: Option<PathBuf>,
}

/// CLI options for probing a server.
#[derive(Parser, Debug, Clone)]
struct ProbeArgs {
    #[arg(long, default_value = "tcp:127.0.0.1:6641")]
    server: String,

    #[arg(long, default_value = "5s")]
    op_timeout: humantime::Duration,
}

#[tokio::main]
/// Parse CLI args, initialize logging, and dispatch to the selected subcommand.
async fn main() -> anyhow::Result<()> {
    // Enable ANSI colors only when stdout is a terminal and NO_COLOR is unset.
    let ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match args.cmd {
        Command::Run(args) => run(args).await,
        Command::Probe(args) => probe(args).await,
    }
}

/// Run the benchmark and print the report.
async fn run(args: RunArgs) -> anyhow::Result<()> {
    // Reject a bad op token before any connection is attempted.
    let op = OpKind::resolve(args.op.as_deref())?;
    anyhow::ensure!(args.clients > 0, "--clients must be > 0");

    let target = BenchTarget {
        database: args.database,
        table: args.table,
        ..BenchTarget::default()
    };
    let config = HarnessConfig {
        address: args.server,
        clients: args.clients,
        duration: args.duration.into(),
        max_requests: args.requests,
        client: ClientConfig {
            op,
            target,
            seed: args.seed,
        },
        ..HarnessConfig::default()
    };
    let connector = JsonRpcConnector {
        op_timeout: args.op_timeout.into(),
        max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
    };

    let report = harness::run(connector, config).await?;
    let rendered = serde_json::to_string_pretty(&report).context("serialize report")?;
    println!("{rendered}");
    if let Some(path) = args.report {
        harness::write_report(&path, &report)?;
        tracing::info!(path = %path.display(), "wrote report");
    }
    Ok(())
}

/// Connect once and list databases; useful to check reachability.
async fn probe(args: ProbeArgs) -> anyhow::Result<()> {
    let op_timeout: Duration = args.op_timeout.into();
    let session = JsonRpcSession::connect(&args.server, op_timeout, DEFAULT_MAX_FRAME_BYTES)
        .await
        .with_context(|| format!("connect to {}", args.server))?;
    let dbs = session.list_dbs().await.context("list_dbs")?;
    for db in dbs {
        println!("{db}");
    }
    Ok(())
}
