//! DanceMatch server with the synthetic camera and dancer
//!
//! Config comes from the JSON file named by `DANCEMATCH_CONFIG`, if set.

use std::sync::Arc;

use dancematch_runtime::server::{router, serve};
use dancematch_runtime::synthetic::{SyntheticDancer, TestPatternSource};
use dancematch_runtime::{init_tracing, DanceConfig, DanceSession, PpmEncoder};
use tracing::{error, info};

const DEMO_WIDTH: u32 = 640;
const DEMO_HEIGHT: u32 = 360;

#[tokio::main]
async fn main() {
    let config = match DanceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    if let Err(e) = init_tracing(config.log_format) {
        eprintln!("{e}");
    }

    let session = DanceSession::from_config(
        &config,
        Box::new(TestPatternSource::new(DEMO_WIDTH, DEMO_HEIGHT)),
        Box::new(SyntheticDancer::default()),
    );
    let app = router(session.clone(), Arc::new(PpmEncoder));

    let listener = match tokio::net::TcpListener::bind(config.http.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(bind = %config.http.bind, error = %e, "failed to bind HTTP port");
            std::process::exit(1);
        }
    };
    info!(bind = %config.http.bind, "HTTP server listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    };
    if let Err(e) = serve(listener, app, shutdown).await {
        error!(error = %e, "server stopped with error");
    }

    session.stop_session();
    info!(stats = ?session.pipeline_stats(), "server stopped");
}
