pub mod app;
pub mod bridge;
pub mod config;
pub mod console;
pub mod dialog;
pub mod error;
pub mod host;
pub mod login;
pub mod router;
pub mod session;
pub mod state;
pub mod user_data;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use tracing::{error, info, warn};

use app::{APP_NAME, APP_VERSION};
use config::ShellConfig;
use console::Console;
use host::{HttpCardVerifier, LocalHost, YamlStore};
use state::AppState;

pub fn run() {
    let config = ShellConfig::load();

    // stdout belongs to the surface
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    info!("Starting {} {}", APP_NAME, APP_VERSION);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        error!("Shell exited with error: {:#}", e);
        std::process::exit(1);
    }
}

async fn serve(config: ShellConfig) -> anyhow::Result<()> {
    info!("Verification server: {}", config.backend_url());
    let verifier = Arc::new(HttpCardVerifier::new(
        config.backend_url(),
        config.http_timeout(),
    )?);
    let reachable = verifier.probe().await;

    let data_path = match &config.data_file {
        Some(path) => path.clone(),
        None => YamlStore::default_path()?,
    };
    info!("User data file: {:?}", data_path);

    let host = Arc::new(
        LocalHost::new(verifier, YamlStore::new(data_path))
            .with_monitor_interval(config.host_monitor_interval()),
    );
    let state = Arc::new(AppState::new(config, host));
    state.start().await;

    if !reachable {
        warn!("Continuing without a reachable verification server");
        state.dialogs().error(
            "Server unreachable",
            Some("Could not connect to the verification server. Logging in will fail until it is back."),
        );
    }

    let result = Console::new(state.clone()).run().await;
    state.shutdown();
    result
}
