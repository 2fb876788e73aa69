// Main entry point for the cutout-server application.
// Loads the segmentation model once, configures the Axum router,
// and serves the upload page and the background removal endpoint.

mod remover;
mod shutdown_signal;
mod web;

use clap::Parser;
use remover::{ModelKind, OnnxRemover, SharedRemover};
use shutdown_signal::shutdown_signal;
use std::{path::PathBuf, sync::Arc};
use tracing::Level;
use web::{AppState, create_app, create_listener};

/// Command line arguments for cutout-server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppConfig {
    /// Hostname/IP to bind the server to.
    /// "*" (the default) listens on all interfaces.
    #[arg(long, env = "CUTOUT_SERVER_HOST", default_value = "*")]
    host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Path to the ONNX segmentation model.
    #[arg(long, env = "CUTOUT_SERVER_MODEL", default_value = "models/u2netp.onnx")]
    model: PathBuf,

    /// Model family of the file given by --model.
    #[arg(long, env = "CUTOUT_SERVER_MODEL_KIND", value_enum, default_value_t = ModelKind::U2netp)]
    model_kind: ModelKind,

    /// Uploads whose width or height exceeds this are downscaled before inference.
    /// Set to 0 to disable downscaling.
    #[arg(long, env = "CUTOUT_SERVER_MAX_DIMENSION", default_value_t = 1024)]
    max_dimension: u32,

    /// Threads used within each inference operation. 0 uses all available cores.
    #[arg(long, env = "CUTOUT_SERVER_INTRA_THREADS", default_value_t = 0)]
    intra_threads: usize,

    /// Directory served under /static.
    #[arg(long, env = "CUTOUT_SERVER_STATIC_DIR", default_value = "static")]
    static_dir: PathBuf,

    /// Log at DEBUG instead of INFO.
    #[arg(short, long, env = "CUTOUT_SERVER_VERBOSE", action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    // Parse command line args and environment variables
    let config = AppConfig::parse();

    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_max_level(if config.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting cutout-server...");

    // --- Load the segmentation model ---
    // Done once; every request shares this session.
    let model_path = config.model.clone();
    let model_kind = config.model_kind;
    let intra_threads = config.intra_threads;
    let remover = match tokio::task::spawn_blocking(move || {
        OnnxRemover::load(&model_path, model_kind, intra_threads)
    })
    .await
    {
        Ok(Ok(remover)) => remover,
        Ok(Err(err)) => {
            tracing::error!("FATAL: {}", err);
            eprintln!("FATAL: Model initialization failed. See logs for details. Exiting.");
            std::process::exit(1);
        }
        Err(err) => {
            tracing::error!("FATAL: Model loading task failed: {}", err);
            std::process::exit(1);
        }
    };
    let remover: SharedRemover = Arc::new(remover);

    if config.max_dimension > 0 {
        tracing::info!(
            "Uploads larger than {}px are downscaled before inference",
            config.max_dimension
        );
    } else {
        tracing::info!("Downscaling before inference is disabled");
    }

    let app = create_app(
        AppState {
            remover,
            max_dimension: config.max_dimension,
        },
        &config.static_dir,
    );

    tracing::info!("Axum router configured.");

    // --- Start HTTP Server ---
    let listener = match create_listener(&config.host, config.port).await {
        Ok((addr, l)) => {
            tracing::info!("Server successfully bound. Listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("FATAL: Failed to bind server: {}", e);
            eprintln!("FATAL: Could not bind server. Error: {}. Exiting.", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server run error: {}", e);
        eprintln!("ERROR: Server shut down unexpectedly. Error: {}", e);
    }

    tracing::info!("cutout-server has shut down.");
}
