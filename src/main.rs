use std::sync::Arc;

use tokio_util::sync::CancellationToken;

mod config;
mod credential;
mod error;
mod gemini;
mod handler;
mod logging;
mod models;
mod normalize;
mod pipeline;
mod retry;
mod session;
#[cfg(test)]
mod testing;
mod vision;

use config::Config;
use gemini::GeminiService;
use handler::AppState;
use pipeline::AliasPipeline;
use vision::VisionService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv = config::load_dotenv();
    let config = Config::from_env()?;
    logging::init(config.log_format);
    dotenv.log();

    if config.default_credential.is_none() {
        tracing::warn!("GEMINI_API_KEY not set; requests must pass api_key");
    }

    let service: Arc<dyn VisionService> = Arc::new(GeminiService::new(config.base_url.clone()));
    let pipeline = AliasPipeline::from_config(&config, service);

    let shutdown = CancellationToken::new();
    let app = handler::router(AppState {
        pipeline: Arc::new(pipeline),
        shutdown: shutdown.clone(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM and cancel in-flight invocations.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
    shutdown.cancel();
}
