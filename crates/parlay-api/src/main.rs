//! Parlay CLI and REST API entry point.
//!
//! Binary name: `parlay`
//!
//! Parses CLI arguments, initializes the database and chat service, then
//! dispatches to the appropriate command handler or starts the REST API
//! server.

mod cli;
mod http;
mod state;

use clap::Parser;

use cli::{Cli, Commands, KeysCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parlay=debug",
        _ => "trace",
    };

    let otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    parlay_observe::tracing_setup::init_tracing(otel, filter)
        .map_err(|e| anyhow::anyhow!("tracing setup: {e}"))?;

    // Initialize application state (DB, services)
    let state = AppState::init().await?;

    match cli.command {
        Commands::Keys { action } => match action {
            KeysCommand::Create { name } => {
                cli::keys::create_key(&state, &name, cli.json).await?;
            }
            KeysCommand::List => {
                cli::keys::list_keys(&state, cli.json).await?;
            }
        },

        Commands::Serve { port, host, .. } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!("  Parlay API listening on http://{addr}");
            println!("  Press Ctrl+C to stop");

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            parlay_observe::tracing_setup::shutdown_tracing();
            println!("\n  Server stopped.");
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
