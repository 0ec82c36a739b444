use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgAction, Command};
use emulator::EmulatorConfig;
use tracing::info;

fn validate_routes_number(value: &str) -> Result<usize, String> {
    let number = value
        .parse::<usize>()
        .map_err(|_| "Invalid routes number".to_owned())?;
    if (1..=595).contains(&number) {
        Ok(number)
    } else {
        Err("Expected an integer between 1 and 595".to_owned())
    }
}

fn validate_positive(value: &str) -> Result<usize, String> {
    let number = value
        .parse::<usize>()
        .map_err(|_| "Invalid number".to_owned())?;
    if number > 0 {
        Ok(number)
    } else {
        Err("Expected a positive integer".to_owned())
    }
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
    let matches = Command::new("Bus Emulator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Streams simulated bus coordinates to the relay server")
        .arg(
            Arg::new("server")
                .help("WebSocket URL of the relay's ingest port")
                .long("server")
                .default_value("ws://127.0.0.1:8080/ws"),
        )
        .arg(
            Arg::new("routes_number")
                .help("How many routes to take from the corpus")
                .long("routes_number")
                .value_parser(validate_routes_number)
                .default_value("595"),
        )
        .arg(
            Arg::new("buses_per_route")
                .help("Upper bound on the random bus count per route")
                .long("buses_per_route")
                .value_parser(validate_positive)
                .default_value("100"),
        )
        .arg(
            Arg::new("websockets_number")
                .help("Number of outbound connections in the egress pool")
                .long("websockets_number")
                .value_parser(validate_positive)
                .default_value("10"),
        )
        .arg(
            Arg::new("emulator_id")
                .help("Prefix for bus ids when running several emulators")
                .long("emulator_id")
                .default_value(""),
        )
        .arg(
            Arg::new("refresh_timeout")
                .help("Seconds between coordinate updates per bus")
                .long("refresh_timeout")
                .value_parser(validate_seconds)
                .default_value("0.3"),
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

    info!(version = env!("CARGO_PKG_VERSION"), "emulator starting");

    let config = EmulatorConfig {
        server_url: matches
            .get_one::<String>("server")
            .expect("server has a default")
            .clone(),
        routes_dir: PathBuf::from(emulator::ROUTES_DIR),
        routes_number: *matches
            .get_one::<usize>("routes_number")
            .expect("routes_number has a default"),
        buses_per_route: *matches
            .get_one::<usize>("buses_per_route")
            .expect("buses_per_route has a default"),
        websockets_number: *matches
            .get_one::<usize>("websockets_number")
            .expect("websockets_number has a default"),
        emulator_id: matches
            .get_one::<String>("emulator_id")
            .expect("emulator_id has a default")
            .clone(),
        refresh_timeout: Duration::from_secs_f64(
            *matches
                .get_one::<f64>("refresh_timeout")
                .expect("refresh_timeout has a default"),
        ),
    };

    if let Err(e) = emulator::run(config).await {
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}
