mod client;
mod output;
mod protocol;
mod query_server;
mod telemetry;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use logdock_core::config::Config;
use logdock_core::filter::LogCriteria;
use logdock_core::model::event::LiveEvent;
use logdock_core::model::log::{LogLevel, LogRecord};
use logdock_core::query::ErrorResponse;
use logdock_core::time::parse_time_or_relative;
use logdock_ingest::{AppState, Broadcaster, Pipeline, PipelineConfig};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio_tungstenite::tungstenite::Message;

use crate::client::QueryClient;
use crate::output::{print_live_record, print_query_human, print_status_human};
use crate::protocol::{ApiRequest, ApiResponse};
use crate::telemetry::{LogFormat, init_cli_tracing, init_run_tracing};

#[derive(Parser, Debug)]
#[command(name = "logdock")]
#[command(about = "Local structured log ingest, query and live tail")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    uds: Option<PathBuf>,

    #[arg(long, global = true, help = "Query server TCP address")]
    addr: Option<String>,

    #[arg(long, global = true, help = "HTTP server address for ingest and tail")]
    http_addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the HTTP and query servers")]
    Run {
        #[arg(long)]
        data_path: Option<PathBuf>,
        #[arg(long)]
        query_tcp_addr: Option<String>,
        #[arg(long)]
        query_uds_path: Option<PathBuf>,
        #[arg(long)]
        retention_cap: Option<usize>,
    },
    #[command(about = "Post log records from a file or stdin")]
    Ingest {
        #[arg(help = "JSON file holding one record or an array of records; stdin if omitted")]
        file: Option<PathBuf>,
    },
    #[command(about = "Query stored logs, newest first")]
    Query {
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        resource: Option<String>,
        #[arg(long)]
        trace: Option<String>,
        #[arg(long)]
        span: Option<String>,
        #[arg(long)]
        commit: Option<String>,
        #[arg(long, help = "Lower bound, absolute or relative (e.g. 15m)")]
        since: Option<String>,
        #[arg(long, help = "Upper bound, absolute or relative")]
        until: Option<String>,
    },
    #[command(about = "Stream newly ingested logs")]
    Tail {
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        resource: Option<String>,
    },
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data_path,
            query_tcp_addr,
            query_uds_path,
            retention_cap,
        } => {
            init_run_tracing(LogFormat::from_env());
            run_server(RunOverrides {
                data_path,
                http_addr: cli.http_addr,
                query_tcp_addr,
                query_uds_path,
                retention_cap,
            })
            .await
        }
        Commands::Ingest { file } => {
            init_cli_tracing();
            let body = read_input(file).await?;
            run_ingest(&http_addr(cli.http_addr), &body, cli.json).await
        }
        Commands::Query {
            level,
            message,
            resource,
            trace,
            span,
            commit,
            since,
            until,
        } => {
            init_cli_tracing();
            let criteria = LogCriteria {
                level,
                message,
                resource_id: resource,
                trace_id: trace,
                span_id: span,
                commit,
                timestamp_start: parse_bound(since)?,
                timestamp_end: parse_bound(until)?,
            };
            let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
            let response = client.request(ApiRequest::Query(criteria)).await?;
            print_response(response, cli.json)
        }
        Commands::Tail { level, resource } => {
            init_cli_tracing();
            let level = level
                .map(|l| l.parse::<LogLevel>())
                .transpose()
                .context("parse --level")?;
            run_tail(
                &http_addr(cli.http_addr),
                TailFilter { level, resource },
                cli.json,
            )
            .await
        }
        Commands::Status => {
            init_cli_tracing();
            let mut client = QueryClient::connect(cli.uds, cli.addr).await?;
            let response = client.request(ApiRequest::Status).await?;
            print_response(response, cli.json)
        }
    }
}

struct RunOverrides {
    data_path: Option<PathBuf>,
    http_addr: Option<String>,
    query_tcp_addr: Option<String>,
    query_uds_path: Option<PathBuf>,
    retention_cap: Option<usize>,
}

async fn run_server(overrides: RunOverrides) -> anyhow::Result<()> {
    let mut cfg = Config::load().context("load config")?;
    if let Some(v) = overrides.data_path {
        cfg.data_path = v;
    }
    if let Some(v) = overrides.http_addr {
        cfg.http_addr = v;
    }
    if let Some(v) = overrides.query_tcp_addr {
        cfg.query_tcp_addr = v;
    }
    if let Some(v) = overrides.query_uds_path {
        cfg.uds_path = v;
    }
    if let Some(v) = overrides.retention_cap {
        anyhow::ensure!(v > 0, "--retention-cap must be at least 1");
        cfg.retention_cap = v;
    }

    let http_addr: SocketAddr = cfg
        .http_addr
        .parse()
        .with_context(|| format!("parse http addr {}", cfg.http_addr))?;
    let query_tcp_addr: SocketAddr = cfg
        .query_tcp_addr
        .parse()
        .with_context(|| format!("parse query tcp addr {}", cfg.query_tcp_addr))?;

    let store = logdock_store::Store::open(&cfg.data_path, cfg.retention_cap)?;
    let broadcaster = Broadcaster::new(cfg.broadcast_capacity);
    let pipeline = Pipeline::new(
        store.clone(),
        broadcaster.clone(),
        PipelineConfig {
            channel_capacity: cfg.channel_capacity,
        },
    );

    eprintln!("logdock run");
    eprintln!("  data: {}", cfg.data_path.display());
    eprintln!("  retention cap: {}", cfg.retention_cap);
    eprintln!("  http: {http_addr} (POST/GET/DELETE /logs, /ws)");
    eprintln!("  query uds: {}", cfg.uds_path.display());
    eprintln!("  query tcp: {query_tcp_addr}");

    let state = AppState {
        store: store.clone(),
        pipeline,
        broadcaster: broadcaster.clone(),
        ws_ping_interval: cfg.ws_ping_interval,
    };
    let http_task = tokio::spawn(logdock_ingest::server::run_http_server(state, http_addr));
    let query_task = tokio::spawn(query_server::run_query_server(
        store,
        broadcaster,
        cfg.uds_path.clone(),
        query_tcp_addr,
    ));

    tokio::select! {
        res = http_task => {
            res??;
        }
        res = query_task => {
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}

fn http_addr(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var("LOGDOCK_HTTP_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1:3001".to_string())
}

async fn read_input(file: Option<PathBuf>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("read stdin")?;
            Ok(buf)
        }
    }
}

/// A top-level array is posted one element at a time.
fn split_candidates(body: &str) -> anyhow::Result<Vec<Value>> {
    let value: Value = serde_json::from_str(body).context("input is not valid JSON")?;
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

async fn run_ingest(addr: &str, body: &str, json: bool) -> anyhow::Result<()> {
    let candidates = split_candidates(body)?;
    let url = format!("http://{addr}/logs");
    let client = reqwest::Client::new();

    let mut failed = 0usize;
    for candidate in &candidates {
        let response = client
            .post(&url)
            .json(candidate)
            .send()
            .await
            .with_context(|| format!("post to {url}"))?;
        let status = response.status();

        if status.is_success() {
            let record: LogRecord = response.json().await.context("decode stored record")?;
            if json {
                println!("{}", serde_json::to_string(&record)?);
            } else {
                println!("stored {} ({})", record.id, record.message);
            }
        } else {
            failed += 1;
            let reason = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_else(|_| status.to_string());
            eprintln!("rejected ({status}): {reason}");
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} records were not stored", candidates.len());
    }
    Ok(())
}

struct TailFilter {
    level: Option<LogLevel>,
    resource: Option<String>,
}

impl TailFilter {
    fn accepts(&self, record: &LogRecord) -> bool {
        self.level.is_none_or(|l| record.level == l)
            && self
                .resource
                .as_deref()
                .is_none_or(|r| record.resource_id == r)
    }
}

async fn run_tail(addr: &str, filter: TailFilter, json: bool) -> anyhow::Result<()> {
    let url = format!("ws://{addr}/ws");
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .with_context(|| format!("connect {url}"))?;
    tracing::debug!(%url, "tail connected");

    while let Some(msg) = socket.next().await {
        match msg.context("read tail stream")? {
            Message::Text(text) => {
                let event: LiveEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::debug!(error = %err, "skipping unrecognized tail frame");
                        continue;
                    }
                };
                let LiveEvent::LogIngested {
                    record,
                    total_count,
                } = event;
                if !filter.accepts(&record) {
                    continue;
                }
                if json {
                    println!("{}", serde_json::to_string(&record)?);
                } else {
                    print_live_record(&record, total_count);
                }
            }
            Message::Ping(payload) => socket.send(Message::Pong(payload)).await?,
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}

/// Relative bounds are resolved on the client so the server only ever sees
/// absolute RFC 3339 strings.
fn parse_bound(raw: Option<String>) -> anyhow::Result<Option<String>> {
    raw.map(|v| {
        parse_time_or_relative(&v)
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            .with_context(|| format!("parse time bound {v}"))
    })
    .transpose()
}

fn print_response(response: ApiResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    match response {
        ApiResponse::Query(v) => print_query_human(&v),
        ApiResponse::Status(v) => print_status_human(&v),
        ApiResponse::Error(e) => anyhow::bail!("query server error: {e}"),
    }
    Ok(())
}
