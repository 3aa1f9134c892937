pub mod commands;
pub mod core;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::core::launcher::LauncherEvent;
use crate::core::platform::{ExitCode, Host, ProcessHost};
use crate::core::state::AppState;

/// Headless entry point: run the startup sequence and exit.
pub fn run() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,launchkit_lib=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("launchkit {} starting...", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Could not start async runtime: {}", e);
            std::process::exit(ExitCode::Crash.code());
        }
    };

    let code = runtime.block_on(async {
        let host: Arc<dyn Host> = Arc::new(ProcessHost);
        let state = match AppState::new(host) {
            Ok(state) => state,
            Err(e) => {
                error!("Initialization failed: {}", e);
                return ExitCode::Crash;
            }
        };

        let printers = [
            forward_events("main", state.main.subscribe()),
            forward_events("self", state.self_updater.launcher().subscribe()),
        ];

        let code = match commands::startup(&state).await {
            Ok(outcome) => {
                info!("Startup finished: {:?}", outcome);
                ExitCode::Normal
            }
            Err(e) => {
                error!("Startup failed: {}", e);
                ExitCode::Crash
            }
        };

        // Closing the launchers ends the forwarders once their queues drain.
        drop(state);
        for printer in printers {
            let _ = printer.await;
        }
        code
    });

    std::process::exit(code.code());
}

/// Print each event as one JSON line on stdout.
fn forward_events(
    launcher: &'static str,
    mut rx: broadcast::Receiver<LauncherEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let mut line = match serde_json::to_value(&event) {
                        Ok(value) => value,
                        Err(e) => {
                            warn!("Unserializable event {:?}: {}", event, e);
                            continue;
                        }
                    };
                    if let Some(object) = line.as_object_mut() {
                        object.insert("launcher".into(), launcher.into());
                        object.insert("at".into(), Utc::now().to_rfc3339().into());
                    }
                    println!("{}", line);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event output lagged; {} events dropped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
