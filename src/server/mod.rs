//! Serving API trees over HTTP
//!
//! [`Server`] wraps the router of an API tree with request tracing (and an
//! optional timeout), binds the configured address and shuts down gracefully
//! on Ctrl+C or SIGTERM. In-flight requests get the configured grace period
//! to finish before the server stops anyway.
//!
//! ```rust,ignore
//! nestapi::server::init_tracing("info");
//!
//! let config = ServerConfig::default().with_env_overrides()?;
//! Server::new(&artists)?.with_config(config).serve().await?;
//! ```

use crate::api::ApiNode;
use crate::config::ServerConfig;
use crate::core::error::ConfigError;
use anyhow::Result;
use axum::Router;
use axum::http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// HTTP server for one API tree
pub struct Server {
    router: Router,
    config: ServerConfig,
}

impl Server {
    /// Server for the tree below `node`
    pub fn new(node: &dyn ApiNode) -> Result<Self, ConfigError> {
        Ok(Self::from_router(node.router()?))
    }

    /// Server for an already built router, e.g. several trees merged together
    pub fn from_router(router: Router) -> Self {
        Self {
            router,
            config: ServerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The router as served, with tracing and timeout layers
    pub fn app(&self) -> Router {
        let mut app = self.router.clone();
        if let Some(timeout) = self.config.request_timeout() {
            app = app.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ));
        }
        app.layer(TraceLayer::new_for_http())
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` completes
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.address).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        run(
            listener,
            self.app(),
            signal,
            self.config.shutdown_grace_period(),
        )
        .await
    }

    /// Bind and serve in a background task
    ///
    /// Bind to port 0 to let the OS choose; [`ServerHandle::local_addr`] tells
    /// which port was picked. Dropping the handle also shuts the server down.
    pub async fn spawn(self) -> Result<ServerHandle> {
        let listener = TcpListener::bind(&self.config.address).await?;
        let addr = listener.local_addr()?;
        let (shutdown, stopped) = oneshot::channel::<()>();

        let app = self.app();
        let grace = self.config.shutdown_grace_period();
        let task = tokio::spawn(async move {
            let signal = async move {
                let _ = stopped.await;
            };
            run(listener, app, signal, grace).await
        });

        tracing::debug!(%addr, "spawned server");
        Ok(ServerHandle {
            addr,
            shutdown,
            task,
        })
    }
}

/// A server running in the background
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the server, e.g. `http://127.0.0.1:43125`
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Trigger graceful shutdown and wait for the server to stop
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await?
    }
}

async fn run<F>(listener: TcpListener, app: Router, signal: F, grace: Duration) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let draining = Arc::new(Notify::new());
    let notify = draining.clone();

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        signal.await;
        notify.notify_one();
    });
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => result?,
        _ = draining.notified() => {
            match tokio::time::timeout(grace, server).await {
                Ok(result) => result?,
                Err(_) => tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Grace period elapsed, no longer waiting for open connections"
                ),
            }
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or by `default_directive`
/// when it is unset
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Signal handler for graceful shutdown
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
