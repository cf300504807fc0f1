//! Lifecycle Coordinator
//!
//! Startup order, every step fatal on failure:
//!
//! ```text
//! open_store()        connect + PING (or build the memory engine)
//! Server::bind()      route table, TLS material, listener
//! Server::run()       accept loop until the shutdown flag is set
//! ```
//!
//! ## Connection Lifecycle
//!
//! ```text
//! accept
//!   │
//!   ▼
//! rate limiter ──deny──> drop socket (nothing parsed)
//!   │ accept
//!   ▼
//! TLS handshake (if configured)
//!   │
//!   ▼
//! HTTP/1.1 via hyper ──> axum router ──> store handler
//!   │
//!   └── shutdown: finish the in-flight request, then close
//! ```

use crate::config::{AppConfig, StoreBackend};
use crate::connection::{
    ConnectionOptions, ConnectionTask, LockedConnection, RespStore, StoreAddress, StoreConnection,
};
use crate::routes::create_router;
use crate::state::AppState;
use crate::storage::{ExpirySweeper, KvStore, MemoryStore, StoreError};
use crate::tls::{self, TlsError};
use axum::extract::connect_info::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("tls: {0}")]
    Tls(#[from] TlsError),

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// The process's one store, plus whatever keeps it alive.
pub struct StoreHandle {
    pub store: Arc<dyn KvStore>,
    /// Only the memory backend sweeps; a store server expires keys itself.
    sweeper: Option<ExpirySweeper>,
}

impl StoreHandle {
    /// How often expired keys are reclaimed, when this process does it.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweeper.as_ref().map(ExpirySweeper::interval)
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("sweep_interval", &self.sweep_interval())
            .finish()
    }
}

/// Connects to the configured store and checks it answers.
///
/// `server.threaded` picks the guard: a mutex for the multi-threaded runtime,
/// an owning task for the single-threaded one.
pub async fn open_store(config: &AppConfig) -> Result<StoreHandle, ServerError> {
    let threaded = config.server.threaded;
    let store_config = &config.store;

    if store_config.backend == StoreBackend::Memory {
        let engine = Arc::new(MemoryStore::new());
        let sweeper = config
            .sweep_interval()
            .map(|every| ExpirySweeper::start(Arc::clone(&engine), every));
        info!("Using in-process memory store");
        return Ok(StoreHandle {
            store: engine,
            sweeper,
        });
    }

    let address: StoreAddress = store_config.address.parse()?;
    let options = ConnectionOptions {
        address,
        password: store_config.password.clone(),
        io_timeout: store_config.io_timeout(),
    };

    let mut connection = StoreConnection::connect(options).await?;
    connection.ping().await?;
    info!(address = %connection.address(), threaded, "Store is reachable");

    let store: Arc<dyn KvStore> = if threaded {
        Arc::new(RespStore::new(LockedConnection::new(connection)))
    } else {
        Arc::new(RespStore::new(ConnectionTask::spawn(connection)))
    };
    Ok(StoreHandle {
        store,
        sweeper: None,
    })
}

/// A bound listener ready to serve.
pub struct Server {
    listener: TcpListener,
    state: AppState,
    router: Router,
    tls: Option<TlsAcceptor>,
    drain_timeout: Duration,
}

impl Server {
    /// Builds the route table, loads TLS material and binds the listener.
    pub async fn bind(config: &AppConfig, state: AppState) -> Result<Self, ServerError> {
        let router = create_router(state.clone());

        let tls = match config.tls.paths() {
            Some((cert, key)) => {
                let acceptor = tls::load_acceptor(cert, key)?;
                info!(cert = %cert.display(), "TLS enabled");
                Some(acceptor)
            }
            None => None,
        };

        let addr = config.server.bind;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            state,
            router,
            tls,
            drain_timeout: config.server.drain_timeout(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until the shutdown flag is set, then drains open connections.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            state,
            router,
            tls,
            drain_timeout,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, tls = tls.is_some(), "Listening");
        }

        let (drain_tx, drain_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = state.shutdown.wait() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(client = %peer, error = %e, "Failed to set TCP_NODELAY");
                        }
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            state.clone(),
                            router.clone(),
                            tls.clone(),
                            drain_rx.clone(),
                        ));
                    }
                    Err(e) => {
                        // Usually fd exhaustion; back off instead of spinning.
                        error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        info!(open = connections.len(), "Listener stopped, draining connections");

        // Receivers may all be gone already; that only means nothing is left to drain.
        let _ = drain_tx.send(true);
        let drained = tokio::time::timeout(drain_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = connections.len(),
                "Drain timed out, closing remaining connections"
            );
            connections.shutdown().await;
        }

        info!("All connections closed");
        Ok(())
    }
}

/// Admission, optional TLS, then HTTP for one accepted connection.
pub(crate) async fn serve_connection<S>(
    stream: S,
    peer: SocketAddr,
    state: AppState,
    router: Router,
    tls: Option<TlsAcceptor>,
    drain: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    if !state.limiter.check(peer.ip()).await.is_accepted() {
        return;
    }

    match tls {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(stream) => serve_http(stream, peer, router, drain).await,
            Err(e) => debug!(client = %peer, error = %e, "TLS handshake failed"),
        },
        None => serve_http(stream, peer, router, drain).await,
    }
}

async fn serve_http<S>(stream: S, peer: SocketAddr, router: Router, mut drain: watch::Receiver<bool>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = drain.changed() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };

    if let Err(e) = result {
        debug!(client = %peer, error = %e, "Connection ended with error");
    }
}

/// Resolves on SIGINT or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
