//! Listener lifecycle.
//!
//! `Gateway::start` binds the enabled listeners and serves them in the
//! background. `Gateway::stop` cancels the shared shutdown token, waits for
//! each listener to close, then waits for every tracked session to finish.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ariwire_core::error::{AriWireError, Result};

use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::router;

/// One listening endpoint served in the background.
pub struct GatewayServer {
    name: &'static str,
    local_addr: SocketAddr,
    task: JoinHandle<Result<()>>,
}

impl GatewayServer {
    pub async fn bind(
        name: &'static str,
        listen: SocketAddr,
        app: Router,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let listener = TcpListener::bind(listen)
            .await
            .map_err(|e| AriWireError::Transport(format!("{name} bind {listen}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AriWireError::Transport(format!("{name} local_addr: {e}")))?;
        tracing::info!(server = name, %local_addr, "listening");

        let task = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| AriWireError::Transport(format!("{name} server: {e}")))
        });

        Ok(Self {
            name,
            local_addr,
            task,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Bound address; differs from the configured one when port 0 was asked.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the listener to close.
    pub async fn join(self) -> Result<()> {
        let name = self.name;
        self.task
            .await
            .map_err(|e| AriWireError::Internal(format!("{name} server task: {e}")))?
    }
}

/// Control and media listeners sharing one state.
pub struct Gateway {
    state: AppState,
    control: Option<GatewayServer>,
    media: Option<GatewayServer>,
}

impl Gateway {
    pub async fn start(cfg: &GatewayConfig, dispatcher: Arc<Dispatcher>) -> Result<Self> {
        let state = AppState::new(cfg, dispatcher);

        let control = if cfg.control.enabled {
            let app = router::build_control_router(state.clone());
            let addr = cfg.control.listen_addr()?;
            Some(GatewayServer::bind("control", addr, app, state.shutdown().clone()).await?)
        } else {
            None
        };

        let media = if cfg.media.enabled {
            let app = router::build_media_router(state.clone());
            let addr = cfg.media.listen_addr()?;
            match GatewayServer::bind("media", addr, app, state.shutdown().clone()).await {
                Ok(server) => Some(server),
                Err(e) => {
                    state.shutdown().cancel();
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Self {
            state,
            control,
            media,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn control_addr(&self) -> Option<SocketAddr> {
        self.control.as_ref().map(GatewayServer::local_addr)
    }

    pub fn media_addr(&self) -> Option<SocketAddr> {
        self.media.as_ref().map(GatewayServer::local_addr)
    }

    /// Stop accepting, end every session, and wait until all are gone.
    pub async fn stop(self) -> Result<()> {
        self.state.shutdown().cancel();

        let mut first_err = None;
        for server in [self.control, self.media].into_iter().flatten() {
            let name = server.name();
            if let Err(e) = server.join().await {
                tracing::warn!(server = name, error = %e, "server stopped with error");
                first_err.get_or_insert(e);
            }
        }

        let tracker = self.state.tracker();
        tracker.close();
        tracker.wait().await;
        tracing::info!("gateway stopped");

        first_err.map_or(Ok(()), Err)
    }
}
