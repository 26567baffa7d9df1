//! Listener loop and process lifecycle
//!
//! Serves the router over hyper with bounded keep-alive, drains connections on
//! shutdown, and stops accepting after a configured number of requests so a
//! supervisor can recycle the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::{conn::auto::Builder, graceful::GracefulShutdown},
    service::TowerToHyperService,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;

/// Request counter and shutdown trigger shared by the router and the listener.
#[derive(Debug)]
pub struct Lifecycle {
    served: AtomicU64,
    max_requests: u64,
    shutdown: CancellationToken,
}

impl Lifecycle {
    pub fn new(max_requests: u64) -> Arc<Self> {
        Arc::new(Self {
            served: AtomicU64::new(0),
            max_requests,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn record_request(&self) {
        let served = self.served.fetch_add(1, Ordering::Relaxed) + 1;
        if self.max_requests > 0 && served == self.max_requests {
            info!(
                served,
                "Request limit reached, draining so the process can be recycled"
            );
            self.shutdown.cancel();
        }
    }

    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Accept connections until shutdown is requested, then drain for at most the
/// configured graceful-shutdown timeout.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    config: &ServerConfig,
    lifecycle: Arc<Lifecycle>,
) -> anyhow::Result<()> {
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .keep_alive(true)
        // Idle keep-alive connections wait on the next request head
        .header_read_timeout(config.keepalive());

    let graceful = GracefulShutdown::new();
    let shutdown = lifecycle.shutdown_token();

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.cancelled() => break,
        };
        let (stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "Failed to accept connection");
                continue;
            }
        };

        let service = TowerToHyperService::new(app.clone());
        let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
        let conn = graceful.watch(conn.into_owned());
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!(%peer, error = %err, "Connection closed with error");
            }
        });
    }

    drop(listener);
    info!(
        served = lifecycle.served(),
        "Listener closed, draining in-flight connections"
    );

    tokio::select! {
        _ = graceful.shutdown() => info!("All connections drained"),
        _ = tokio::time::sleep(config.shutdown_timeout()) => warn!(
            timeout_sec = config.shutdown_timeout_sec,
            "Graceful shutdown timed out, dropping remaining connections"
        ),
    }
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM.
pub fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Could not install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Could not install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
