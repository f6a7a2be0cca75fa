//! Challenge Indexer CLI
//!
//! Runs the indexer as a long-lived query server, or performs one-shot
//! maintenance commands against the persisted snapshot and the mirror.

use anyhow::{anyhow, Context, Result};
use challenge_indexer::query::index_status;
use challenge_indexer::server::{run_server, AppState};
use challenge_indexer::{
    ChallengeQueries, IndexerConfig, IndexerService, JsonFileStore, LocalQueries, MirrorClient,
    QueryBackend, RpcLogSource, SnapshotHandle, SnapshotStore, SyncEngine,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "challenge-indexer")]
#[command(about = "Event-sourced indexer for on-chain bounties and challenges")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "INDEXER_CONFIG")]
    config: Option<PathBuf>,

    /// Chain JSON-RPC endpoint
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Query backend
    #[arg(long, value_enum, env = "INDEXER_BACKEND")]
    backend: Option<QueryBackend>,

    /// Remote mirror base URL
    #[arg(long, env = "MIRROR_URL")]
    mirror_url: Option<String>,

    /// Snapshot file
    #[arg(long, env = "SNAPSHOT_PATH")]
    snapshot_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync in the background and serve the query API
    Serve {
        #[arg(long, env = "INDEXER_HOST")]
        host: Option<String>,
        #[arg(short, long, env = "INDEXER_PORT")]
        port: Option<u16>,
    },
    /// Run one sync cycle and exit
    Sync,
    /// Print the persisted snapshot's checkpoint and counts
    Status,
    /// Wait until the mirror has indexed a transaction
    AwaitTx {
        /// Transaction hash
        tx_hash: String,
        /// Give up after this many seconds
        #[arg(long, default_value = "60")]
        max_wait_secs: u64,
    },
}

fn load_config(args: &Args) -> Result<IndexerConfig> {
    let mut config = match &args.config {
        Some(path) => IndexerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => IndexerConfig::default(),
    };

    if let Some(rpc_url) = &args.rpc_url {
        config.chain.rpc_url = rpc_url.clone();
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(mirror_url) = &args.mirror_url {
        config.mirror.base_url = Some(mirror_url.clone());
    }
    if let Some(path) = &args.snapshot_path {
        config.storage.snapshot_path = path.clone();
    }
    if let Command::Serve { host, port } = &args.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }

    config.validate()?;
    Ok(config)
}

fn build_engine(config: &IndexerConfig, handle: SnapshotHandle) -> Result<SyncEngine> {
    let source = Arc::new(RpcLogSource::new(&config.chain.rpc_url)?);
    let store = Arc::new(JsonFileStore::new(&config.storage.snapshot_path));
    Ok(SyncEngine::new(config.sync_settings(), source, store, handle)?)
}

fn build_mirror(config: &IndexerConfig) -> Result<MirrorClient> {
    let base_url = config
        .mirror
        .base_url
        .as_deref()
        .ok_or_else(|| anyhow!("mirror.base_url is not configured"))?;
    let (initial, max) = config.backoff();
    Ok(MirrorClient::with_timeout(base_url, config.request_timeout())?.with_backoff(initial, max))
}

async fn serve(config: IndexerConfig) -> Result<()> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    };

    match config.backend {
        QueryBackend::Local => {
            let handle = SnapshotHandle::new();
            let engine = Arc::new(build_engine(&config, handle.clone())?);
            // publish the persisted snapshot before the first cycle completes
            engine.load_resident()?;

            let service = IndexerService::new(engine, config.poll_interval());
            service.start().await;

            let state = AppState {
                queries: Arc::new(LocalQueries::new(handle)),
                backend: "local",
            };
            let result = run_server(state, &config.server.host, config.server.port, shutdown).await;

            service.stop().await;
            result
        }
        QueryBackend::Remote => {
            let queries: Arc<dyn ChallengeQueries> = Arc::new(build_mirror(&config)?);
            let state = AppState {
                queries,
                backend: "remote",
            };
            run_server(state, &config.server.host, config.server.port, shutdown).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "challenge_indexer=info,info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command {
        Command::Serve { .. } => serve(config).await?,
        Command::Sync => {
            info!("Syncing from {}", config.chain.rpc_url);
            let engine = build_engine(&config, SnapshotHandle::new())?;
            let report = engine.sync_once().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Status => {
            let store = JsonFileStore::new(&config.storage.snapshot_path);
            match store.load()? {
                Some(index) => {
                    println!("{}", serde_json::to_string_pretty(&index_status(&index))?)
                }
                None => println!(
                    "No snapshot at {}",
                    config.storage.snapshot_path.display()
                ),
            }
        }
        Command::AwaitTx {
            tx_hash,
            max_wait_secs,
        } => {
            let mirror = build_mirror(&config)?;
            match mirror
                .await_indexed(&tx_hash, Duration::from_secs(max_wait_secs))
                .await
            {
                Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
                None => {
                    return Err(anyhow!(
                        "{} not indexed within {}s",
                        tx_hash,
                        max_wait_secs
                    ))
                }
            }
        }
    }

    Ok(())
}
