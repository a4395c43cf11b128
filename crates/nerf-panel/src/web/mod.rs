//! HTTP surface: one page plus a small JSON API over the two tab controllers.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::PanelConfig;
use crate::error::{Error, Result};
use crate::supervisor::{JobLauncher, ProcessLauncher, TerminalLauncher};
use crate::tabs::{ProcessorTab, TrainerTab};

mod error;
mod routes;

pub use error::{ApiError, ApiResult};

/// Shared by every handler. Each tab sits behind its own mutex; `None` when disabled.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PanelConfig>,
    pub processor: Option<Arc<Mutex<ProcessorTab>>>,
    pub trainer: Option<Arc<Mutex<TrainerTab>>>,
}

impl AppState {
    pub fn new(config: PanelConfig, launcher: Arc<dyn JobLauncher>) -> Result<Self> {
        let processor = if config.tabs.processor {
            Some(Arc::new(Mutex::new(ProcessorTab::new(
                &config,
                launcher.clone(),
            )?)))
        } else {
            None
        };
        let trainer = if config.tabs.trainer {
            Some(Arc::new(Mutex::new(TrainerTab::new(&config, launcher)?)))
        } else {
            None
        };
        Ok(Self {
            config: Arc::new(config),
            processor,
            trainer,
        })
    }

    pub fn processor(&self) -> ApiResult<Arc<Mutex<ProcessorTab>>> {
        self.processor
            .clone()
            .ok_or(ApiError::TabDisabled("data processor"))
    }

    pub fn trainer(&self) -> ApiResult<Arc<Mutex<TrainerTab>>> {
        self.trainer.clone().ok_or(ApiError::TabDisabled("trainer"))
    }

    /// Terminates every job either tab still tracks.
    pub fn shutdown(&self) {
        if let Some(tab) = &self.processor {
            match tab.lock() {
                Ok(mut tab) => tab.shutdown(),
                Err(poisoned) => poisoned.into_inner().shutdown(),
            }
        }
        if let Some(tab) = &self.trainer {
            match tab.lock() {
                Ok(mut tab) => tab.shutdown(),
                Err(poisoned) => poisoned.into_inner().shutdown(),
            }
        }
    }
}

/// Launcher matching `run_in_new_terminal`.
pub fn launcher_for(config: &PanelConfig) -> Arc<dyn JobLauncher> {
    if config.run_in_new_terminal {
        Arc::new(TerminalLauncher::default())
    } else {
        Arc::new(ProcessLauncher::new())
    }
}

pub fn router(state: AppState) -> Router {
    routes::router()
        .layer(CatchPanicLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

pub async fn serve(config: PanelConfig) -> Result<()> {
    let ip = config
        .server
        .host
        .parse::<IpAddr>()
        .map_err(|e| Error::config(format!("invalid server.host '{}': {e}", config.server.host)))?;
    let addr = SocketAddr::new(ip, config.server.port);
    let launcher = launcher_for(&config);
    let state = AppState::new(config, launcher)?;
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("failed to bind {addr}: {e}")))?;
    tracing::info!(%addr, "serving control panel");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::msg(format!("server error: {e}")))?;

    tracing::info!("server stopped, terminating jobs");
    state.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl-C, shutting down");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
}
