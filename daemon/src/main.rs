//! Soulfra daemon — entry point for running the AI-provider gateway.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use soulfra_gateway::{
    init_logging, server, AppState, GatewayConfig, LogFormat, ShutdownController,
};
use soulfra_registry::{ProbeDriver, ProbeResult, ProviderDescriptor};
use soulfra_router::HttpAdapter;
use soulfra_store::{MemoryStore, Store};
use soulfra_store_lmdb::LmdbStore;

/// Default LMDB map size: 1 GiB, plenty for an append-only ledger that
/// writes a few hundred bytes per entry.
const LMDB_MAP_SIZE: usize = 1 << 30;

#[derive(Parser)]
#[command(name = "soulfra-daemon", about = "Soulfra AI-provider gateway daemon")]
struct Cli {
    /// Address to bind the HTTP listener on.
    #[arg(long, env = "SOULFRA_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Port for the HTTP listener.
    #[arg(long, env = "SOULFRA_LISTEN_PORT")]
    listen_port: Option<u16>,

    /// Data directory for ledger storage.
    #[arg(long, env = "SOULFRA_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Storage backend: "lmdb" or "memory".
    #[arg(long, env = "SOULFRA_BACKEND")]
    backend: Option<String>,

    /// Secret mixed into bearer-token account derivation.
    #[arg(long, env = "SOULFRA_AUTH_SECRET")]
    auth_secret: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SOULFRA_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SOULFRA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Gateway operations.
    #[command(name = "gateway")]
    Gateway {
        #[command(subcommand)]
        action: GatewayAction,
    },
}

#[derive(clap::Subcommand)]
enum GatewayAction {
    /// Run the gateway.
    Run,
}

fn merge_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::from_toml_file(&path.display().to_string())?,
        None => GatewayConfig::default(),
    };

    if let Some(addr) = &cli.listen_addr {
        config.listen_addr = addr.clone();
    }
    if let Some(port) = cli.listen_port {
        config.listen_port = port;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(backend) = &cli.backend {
        config.backend = backend.clone();
    }
    if let Some(secret) = &cli.auth_secret {
        config.auth_secret = secret.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn open_store(config: &GatewayConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.backend.as_str() {
        "memory" => {
            tracing::warn!("memory backend selected: the ledger will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        "lmdb" => Ok(Arc::new(LmdbStore::open(&config.data_dir, LMDB_MAP_SIZE)?)),
        other => anyhow::bail!("unknown backend {other:?} (expected \"lmdb\" or \"memory\")"),
    }
}

/// Reachability probe: any HTTP answer inside the timeout means the
/// provider process is up; 5xx counts as partial, transport-level
/// failures as hard.
fn probe_fn(
    client: reqwest::Client,
) -> impl FnMut(ProviderDescriptor) -> futures_util::future::BoxFuture<'static, ProbeResult> {
    move |descriptor: ProviderDescriptor| {
        let client = client.clone();
        Box::pin(async move {
            let started = std::time::Instant::now();
            match client
                .get(&descriptor.endpoint)
                .timeout(Duration::from_secs(5))
                .send()
                .await
            {
                Ok(response) if response.status().is_server_error() => ProbeResult::PartialFailure,
                Ok(_) => ProbeResult::Success {
                    latency_ms: started.elapsed().as_millis() as u64,
                },
                Err(_) => ProbeResult::HardFailure,
            }
        })
    }
}

async fn run_gateway(config: GatewayConfig) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let adapter = Arc::new(HttpAdapter::new());
    let (state, reconcile_worker) = AppState::build(&config, store, adapter)?;

    let shutdown = ShutdownController::new();

    tokio::spawn(reconcile_worker.run(shutdown.subscribe()));

    let prober = ProbeDriver::new(
        state.registry.clone(),
        Duration::from_secs(state.params.health_probe_interval_secs),
    );
    tokio::spawn(prober.run(probe_fn(reqwest::Client::new()), shutdown.subscribe()));

    let server = tokio::spawn(server::serve(
        state.clone(),
        config.listen_addr.clone(),
        config.listen_port,
        shutdown.subscribe(),
    ));

    shutdown.wait_for_signal().await;
    server.await??;

    tracing::info!("soulfra daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = merge_config(&cli)?;
    init_logging(LogFormat::parse(&config.log_format), &config.log_level);

    if let Some(path) = &cli.config {
        tracing::info!(config = %path.display(), "loaded configuration file");
    }

    match cli.command {
        Command::Gateway { action } => match action {
            GatewayAction::Run => {
                tracing::info!(
                    addr = %config.listen_addr,
                    port = config.listen_port,
                    backend = %config.backend,
                    providers = config.providers.len(),
                    "starting soulfra gateway"
                );
                run_gateway(config).await?;
            }
        },
    }

    Ok(())
}
