//! Outbox CLI - Command-line interface for the Outbox daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9633";

#[derive(Parser)]
#[command(name = "outbox")]
#[command(about = "Outbox offline write queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "OUTBOX_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a request for delivery
    Enqueue {
        /// Target URL (relative URLs are joined to the daemon's base URL)
        #[arg(short, long)]
        url: String,

        /// HTTP method (GET, HEAD, POST, PUT, PATCH, DELETE)
        #[arg(short, long, default_value = "POST")]
        method: String,

        /// Body as JSON (sent verbatim when --raw and the JSON is a string)
        #[arg(short, long)]
        body: Option<String>,

        /// Extra header, repeatable
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Replace any queued job with the same key
        #[arg(short, long)]
        dedupe_key: Option<String>,

        /// Retries after the first attempt
        #[arg(long)]
        max_retries: Option<u32>,

        /// Send a string body as-is instead of JSON-encoding it
        #[arg(long)]
        raw: bool,
    },

    /// Run one batch now
    Flush,

    /// Show queue status
    Status,

    /// List pending jobs
    List,

    /// Drop every pending job
    Reset,

    /// Mark the network as reachable
    Online,

    /// Mark the network as unreachable (pauses delivery)
    Offline,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name must not be empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct FlushResultView {
    job_id: String,
    delivered: bool,
    status: Option<u16>,
    error: Option<String>,
    will_retry: bool,
}

#[derive(Tabled)]
struct FlushRow {
    job_id: String,
    outcome: String,
    detail: String,
    will_retry: bool,
}

impl From<FlushResultView> for FlushRow {
    fn from(view: FlushResultView) -> Self {
        Self {
            job_id: view.job_id,
            outcome: if view.delivered { "DELIVERED" } else { "FAILED" }.to_string(),
            detail: match (view.status, view.error) {
                (Some(status), _) => format!("HTTP {}", status),
                (None, Some(error)) => error,
                (None, None) => String::new(),
            },
            will_retry: view.will_retry,
        }
    }
}

#[derive(Deserialize)]
struct JobView {
    id: String,
    method: String,
    url: String,
    attempt: u32,
    max_retries: u32,
    #[serde(default)]
    dedupe_key: Option<String>,
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    method: String,
    url: String,
    attempts: String,
    dedupe_key: String,
}

impl From<JobView> for JobRow {
    fn from(job: JobView) -> Self {
        Self {
            id: job.id,
            method: job.method,
            url: job.url,
            attempts: format!("{}/{}", job.attempt, job.max_retries.saturating_add(1)),
            dedupe_key: job.dedupe_key.unwrap_or_default(),
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

async fn set_connectivity(url: &str, online: bool) -> Result<()> {
    call_rpc(url, "connectivity.set.v1", json!({ "online": online })).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Enqueue {
            url,
            method,
            body,
            headers,
            dedupe_key,
            max_retries,
            raw,
        } => {
            let body_json: Option<serde_json::Value> = body
                .map(|b| serde_json::from_str(&b))
                .transpose()
                .context("Invalid JSON body")?;
            let headers: BTreeMap<String, String> = headers.into_iter().collect();

            let params = json!({
                "url": url,
                "method": method.to_uppercase(),
                "body": body_json,
                "headers": headers,
                "dedupe_key": dedupe_key,
                "max_retries": max_retries,
                "raw_body": raw,
            });

            let result = call_rpc(&cli.rpc_url, "queue.enqueue.v1", params).await?;

            println!("{}", "✓ Job queued".green().bold());
            println!("  {} {}", "Job ID:".bold(), result["job_id"].as_str().unwrap_or("?"));
        }

        Commands::Flush => {
            let result = call_rpc(&cli.rpc_url, "queue.flush.v1", json!({})).await?;
            let results: Vec<FlushResultView> =
                serde_json::from_value(result["results"].clone()).context("Unexpected flush result")?;

            if results.is_empty() {
                println!("{}", "Nothing flushed (offline, or no eligible jobs)".yellow());
            } else {
                let rows: Vec<FlushRow> = results.into_iter().map(Into::into).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Status => {
            println!("{}", "Queue Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "queue.status.v1", json!({})).await {
                Ok(status) => {
                    let online = if status["online"].as_bool().unwrap_or(false) {
                        "ONLINE".green()
                    } else {
                        "OFFLINE".yellow()
                    };
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Network:".bold(), online);
                    println!();
                    println!("  {} {}", "Pending:".bold(), status["pending"]);
                    println!("  {} {}", "In flight:".bold(), status["in_flight"]);
                    println!("  {} {} seconds", "Uptime:".bold(), status["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Daemon:".bold(), "UNREACHABLE".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::List => {
            let result = call_rpc(&cli.rpc_url, "queue.list.v1", json!({})).await?;
            let jobs: Vec<JobView> =
                serde_json::from_value(result["jobs"].clone()).context("Unexpected job list")?;

            if jobs.is_empty() {
                println!("{}", "Queue is empty".green());
            } else {
                let rows: Vec<JobRow> = jobs.into_iter().map(Into::into).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Reset => {
            let result = call_rpc(&cli.rpc_url, "queue.reset.v1", json!({})).await?;
            println!(
                "{}",
                format!("✓ Cleared {} job(s)", result["cleared"]).green().bold()
            );
        }

        Commands::Online => {
            set_connectivity(&cli.rpc_url, true).await?;
            println!("{}", "✓ Marked online, flushing".green().bold());
        }

        Commands::Offline => {
            set_connectivity(&cli.rpc_url, false).await?;
            println!("{}", "✓ Marked offline, delivery paused".yellow().bold());
        }
    }

    Ok(())
}
