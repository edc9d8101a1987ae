use std::time::Duration;

use clap::Parser;

use nova_backend::config::Config;
use nova_backend::logging::init_tracing;
use nova_backend::{daemon, Result};

#[derive(Parser, Debug)]
#[command(
    name = "nova-backend",
    about = "Chat backend for the Nova assistant",
    version
)]
struct Cli {
    /// Address to bind the HTTP listener on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to serve on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Credential for the Generative Language API.
    #[arg(long, env = "GEMINI_API_KEY")]
    api_key: Option<String>,

    /// Directory holding the per-user memory files.
    #[arg(long, env = "NOVA_DATA_DIR", default_value = "kullanicilar")]
    data_dir: String,

    /// Model name used for generateContent calls.
    #[arg(long, default_value = "gemini-2.5-flash")]
    model: String,

    /// Base URL of the Generative Language API.
    #[arg(
        long,
        default_value = "https://generativelanguage.googleapis.com/v1beta"
    )]
    base_url: String,

    /// Upstream request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,

    /// Attempts per upstream call before the request fails.
    #[arg(long, default_value_t = 3)]
    retry_attempts: u32,

    /// Delay before the first retry, in seconds. Doubles on each attempt.
    #[arg(long, default_value_t = 3)]
    retry_base_delay_secs: u64,

    /// Seconds between warm-up scheduler ticks.
    #[arg(long, default_value_t = 120)]
    warmup_interval_secs: u64,

    /// Seconds without traffic before warm mode starts.
    #[arg(long, default_value_t = 60)]
    idle_threshold_secs: u64,

    /// Timeout multiplier applied to upstream calls while warm.
    #[arg(long, default_value_t = 0.8)]
    warm_speed_multiplier: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("nova-backend");

    let config = Config {
        host: cli.host,
        port: cli.port,
        api_key: cli.api_key.filter(|key| !key.trim().is_empty()),
        data_dir: cli.data_dir,
        model: cli.model,
        base_url: cli.base_url,
        request_timeout: Duration::from_secs(cli.request_timeout_secs),
        retry_attempts: cli.retry_attempts,
        retry_base_delay: Duration::from_secs(cli.retry_base_delay_secs),
        warmup_interval: Duration::from_secs(cli.warmup_interval_secs),
        idle_threshold: Duration::from_secs(cli.idle_threshold_secs),
        warm_speed_multiplier: cli.warm_speed_multiplier,
        ..Config::default()
    };

    daemon::run_with_shutdown(config, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("could not listen for shutdown signal: {err}");
        futures::future::pending::<()>().await;
    }
}
