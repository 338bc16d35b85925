mod bridge;
mod config;
mod logging;

use std::process::ExitCode;

use config::AppConfig;
use notify_transport::spawn_runtime;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    logging::init();
    info!("starting sga-notify");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    for message in &config.disabled {
        warn!("{message}");
    }

    let handle = match spawn_runtime(config.client) {
        Ok(handle) => handle,
        Err(err) => {
            error!(code = %err.code, message = %err.message, "failed to start client runtime");
            return ExitCode::FAILURE;
        }
    };
    let (view, events) = handle.attach();
    let printer = tokio::spawn(bridge::print_events(view, events));
    println!("{}", bridge::HELP);

    tokio::select! {
        _ = bridge::read_gestures(&handle) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted; shutting down");
            let _ = handle.send(notify_core::ClientCommand::Shutdown).await;
        }
    }

    handle.stopped().await;
    printer.abort();
    info!("sga-notify stopped");
    ExitCode::SUCCESS
}
