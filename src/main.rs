//! webstored - the webstore server.
//!
//! Loads configuration, picks the dispatch mode, connects to the store and
//! serves until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webstore::config::{AppConfig, StoreBackend};
use webstore::ratelimit::RateLimiter;
use webstore::server::{open_store, shutdown_signal, Server};
use webstore::shutdown::Shutdown;
use webstore::state::AppState;

/// webstore - content-addressable storage for Z85 payloads
#[derive(Parser, Debug)]
#[command(name = "webstored")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "WEBSTORE_CONFIG",
        default_value = "config/webstore.toml"
    )]
    config: PathBuf,

    /// Address to listen on (overrides server.bind)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Store address, host:port or unix:/path (overrides store.address)
    #[arg(short, long)]
    store: Option<String>,

    /// Use the in-process memory store instead of a server
    #[arg(long)]
    memory: bool,

    /// Serve everything from one thread (overrides server.threaded)
    #[arg(long)]
    single_threaded: bool,

    /// Expire stored records after this many seconds (overrides store.expiration_secs)
    #[arg(short, long)]
    expiration: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(store) = &self.store {
            config.store.address = store.clone();
        }
        if self.memory {
            config.store.backend = StoreBackend::Memory;
        }
        if self.single_threaded {
            config.server.threaded = false;
        }
        if let Some(expiration) = self.expiration {
            config.store.expiration_secs = Some(expiration);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("webstore v{}", webstore::VERSION);

    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    for warning in config.validate()? {
        warn!("{}", warning);
    }

    // The store guard follows the runtime flavor, so the runtime is built by hand.
    let runtime = if config.server.threaded {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
    } else {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
    }
    .context("failed to build async runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> Result<()> {
    let store = open_store(&config)
        .await
        .context("failed to connect to store")?;

    let shutdown = Shutdown::new();
    let limiter = if config.rate_limit.enabled {
        RateLimiter::new(
            store.store.clone(),
            config.rate_limit.limit,
            config.rate_limit.period(),
        )
    } else {
        RateLimiter::disabled(store.store.clone())
    };
    let state = AppState::new(store.store.clone())
        .with_limiter(limiter)
        .with_expiration(config.store.expiration())
        .with_shutdown(shutdown.clone())
        .with_max_payload_bytes(config.server.max_payload_bytes);

    let server = Server::bind(&config, state)
        .await
        .context("failed to start server")?;

    info!(
        threaded = config.server.threaded,
        expiration_secs = ?config.store.expiration_secs,
        rate_limit = config.rate_limit.enabled,
        "Ready to accept connections"
    );

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping server...");
        shutdown.trigger();
    });

    server.run().await?;

    drop(store);
    info!("Store connection released, shutdown complete");
    Ok(())
}
