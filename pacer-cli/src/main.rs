// ABOUTME: Command-line driver that fires a batch of requests through pacer.
// ABOUTME: Prints one JSON line per call; exhausted calls print null.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pacer::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "pacer-cli")]
#[command(about = "Send rate-limited, concurrency-bounded HTTP requests", long_about = None)]
struct Cli {
    /// Base URL every endpoint is appended to.
    #[arg(short = 'u', long, required_unless_present = "config")]
    base_url: Option<String>,

    /// Endpoint path to request.
    #[arg(default_value = "/")]
    endpoint: String,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Number of requests to issue.
    #[arg(short = 'n', long, default_value_t = 10)]
    count: usize,

    /// Requests allowed per window.
    #[arg(long, default_value_t = 5)]
    max_requests: usize,

    /// Window length in seconds.
    #[arg(long, default_value_t = 10.0)]
    window: f64,

    /// Requests allowed in flight at once.
    #[arg(short, long, default_value_t = 2)]
    concurrency: usize,

    /// Delivery attempts per request.
    #[arg(long, default_value_t = 3)]
    attempts: u32,

    /// JSON config file; replaces the limit flags and base URL.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up on each request after this many seconds.
    #[arg(long)]
    deadline: Option<f64>,
}

impl Cli {
    fn dispatcher_config(&self) -> Result<DispatcherConfig> {
        if let Some(path) = &self.config {
            return DispatcherConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()));
        }

        let Some(base_url) = &self.base_url else {
            bail!("a base URL or --config is required");
        };
        let window = Duration::try_from_secs_f64(self.window)
            .with_context(|| format!("invalid window: {}", self.window))?;

        let config = DispatcherConfig::new(base_url.clone(), self.max_requests, window)
            .with_concurrency_limit(self.concurrency)
            .with_max_attempts(self.attempts);
        config.validate()?;
        Ok(config)
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.dispatcher_config()?;
    let method: Method = cli
        .method
        .to_uppercase()
        .parse()
        .with_context(|| format!("invalid HTTP method: {}", cli.method))?;

    tracing::info!(
        base_url = %config.base_url,
        max_requests = config.max_requests_per_window,
        window_secs = config.window_secs,
        concurrency = config.concurrency_limit,
        count = cli.count,
        "Dispatching requests"
    );

    let dispatcher = Dispatcher::http(config)?;

    let results: Vec<Result<Outcome<Value>, DispatchError>> = match cli.deadline {
        Some(secs) => {
            let deadline = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("invalid deadline: {}", secs))?;
            let pending = (0..cli.count).map(|_| {
                dispatcher.send_with_deadline(
                    method.clone(),
                    &cli.endpoint,
                    RequestOptions::new(),
                    deadline,
                )
            });
            futures::future::join_all(pending).await
        }
        None => {
            let calls = (0..cli.count).map(|_| Call::new(method.clone(), cli.endpoint.clone()));
            dispatcher.send_all(calls).await
        }
    };

    let mut exhausted = 0;
    for result in results {
        match result {
            Ok(Outcome::Success(value)) => println!("{}", value),
            Ok(Outcome::Exhausted(exhaustion)) => {
                exhausted += 1;
                tracing::debug!(
                    attempts = exhaustion.attempts,
                    error = %exhaustion.last_failure,
                    "No result"
                );
                println!("null");
            }
            Err(e) => {
                tracing::error!(error = %e, "Request failed");
                println!("null");
            }
        }
    }

    dispatcher.close().await?;
    tracing::info!(exhausted, "Done");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pacer=info,pacer_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(Cli::parse()).await
}
