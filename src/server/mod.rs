//! Web UI server.
//!
//! Serves the upload page and a small JSON API on a multi-threaded tokio
//! runtime. Fits are CPU-bound and run on the blocking pool, so request
//! handling stays responsive while a large file is being fitted.

use crate::cli::ServeArgs;
use crate::error::AppError;

pub mod form;
pub mod page;
pub mod router;

pub use router::{setup_app_router, RouterConfig};

const BYTES_PER_MB: usize = 1024 * 1024;

/// Resolved server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl ServerSettings {
    pub fn from_args(args: &ServeArgs) -> Self {
        Self {
            host: args.host.clone(),
            port: args.port,
            max_upload_bytes: args.max_upload_mb.saturating_mul(BYTES_PER_MB),
        }
    }
}

/// Bind, serve until Ctrl-C/SIGTERM, then drain in-flight requests.
pub async fn serve(settings: ServerSettings) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .map_err(|e| {
            AppError::new(
                2,
                format!("Failed to bind {}:{}: {e}", settings.host, settings.port),
            )
        })?;
    let addr = listener
        .local_addr()
        .map_err(|e| AppError::new(4, format!("Failed to read bound address: {e}")))?;

    tracing::info!(
        %addr,
        max_upload_bytes = settings.max_upload_bytes,
        "stepfit web UI listening"
    );

    let app = setup_app_router(RouterConfig {
        max_upload_bytes: settings.max_upload_bytes,
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(capture_sigterm())
        .await
        .map_err(|e| AppError::new(4, format!("Server error: {e}")))?;

    tracing::info!("server stopped");
    Ok(())
}

/// Captures and waits for system signals.
async fn capture_sigterm() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let term = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = term => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_limit_is_in_megabytes() {
        let args = ServeArgs {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_upload_mb: 200,
        };
        let settings = ServerSettings::from_args(&args);
        assert_eq!(settings.max_upload_bytes, 200 * 1024 * 1024);
        assert_eq!(settings.port, 0);
    }
}
