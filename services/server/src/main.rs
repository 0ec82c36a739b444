use std::future::IntoFuture;
use std::time::Duration;

use clap::{Arg, ArgAction, Command};
use server::AppState;
use tracing::info;

fn validate_port_value(value: &str) -> Result<u16, String> {
    value
        .parse::<u16>()
        .map_err(|_| "Expected an unsigned integer between 0 and 65535".to_owned())
}

fn validate_seconds(value: &str) -> Result<f64, String> {
    let seconds = value
        .parse::<f64>()
        .map_err(|_| "Invalid number of seconds".to_owned())?;
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(seconds)
    } else {
        Err("Expected a non-negative number of seconds".to_owned())
    }
}

fn log_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    }
}

#[tokio::main]
async fn main() {
    let matches = Command::new("Bus Relay Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Relays bus coordinates from emulators to browsers")
        .arg(
            Arg::new("bus_port")
                .help("Port for emulator connections")
                .long("bus_port")
                .value_parser(validate_port_value)
                .default_value("8080"),
        )
        .arg(
            Arg::new("browser_port")
                .help("Port for browser connections")
                .long("browser_port")
                .value_parser(validate_port_value)
                .default_value("8000"),
        )
        .arg(
            Arg::new("refresh_timeout")
                .help("Minimum seconds between snapshots to one browser")
                .long("refresh_timeout")
                .value_parser(validate_seconds)
                .default_value("0.2"),
        )
        .arg(
            Arg::new("verbose")
                .help("Logging verbosity; repeat for more detail")
                .short('v')
                .action(ArgAction::Count),
        )
        .get_matches();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(log_level(matches.get_count("verbose")))
            }),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "server starting");

    let bus_port = *matches
        .get_one::<u16>("bus_port")
        .expect("bus_port has a default");
    let browser_port = *matches
        .get_one::<u16>("browser_port")
        .expect("browser_port has a default");
    let refresh_timeout = Duration::from_secs_f64(
        *matches
            .get_one::<f64>("refresh_timeout")
            .expect("refresh_timeout has a default"),
    );

    let state = AppState::new(refresh_timeout);

    let ingest_listener = match tokio::net::TcpListener::bind(("127.0.0.1", bus_port)).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("FATAL: failed to bind bus port {bus_port}: {e}");
            std::process::exit(1);
        }
    };
    let browser_listener = match tokio::net::TcpListener::bind(("127.0.0.1", browser_port)).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("FATAL: failed to bind browser port {browser_port}: {e}");
            std::process::exit(1);
        }
    };
    info!(bus_port, browser_port, "server listening");

    let ingest = axum::serve(ingest_listener, server::build_ingest_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    let browser = axum::serve(browser_listener, server::build_browser_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    let (ingest_result, browser_result) = tokio::join!(ingest, browser);
    ingest_result.expect("bus listener error");
    browser_result.expect("browser listener error");
    info!("server shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful
/// shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received interrupt, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
