use anyhow::Context;
use clap::{value_parser, Arg, Command};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use triage_core::TriageConfig;
use triage_service::{http, telemetry, TriageService};

/// Time running pipelines get to stop after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("bug-triage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Automated bug analysis and Slack notification service")
        .arg(
            Arg::new("host")
                .long("host")
                .help("Listen address (overrides HOST)"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_parser(value_parser!(u16))
                .help("Listen port (overrides PORT)"),
        )
        .arg(
            Arg::new("env-file")
                .long("env-file")
                .value_parser(value_parser!(PathBuf))
                .help("Environment file to load instead of ./.env"),
        )
        .get_matches();

    match matches.get_one::<PathBuf>("env-file") {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("loading env file {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    let mut config = TriageConfig::from_env().context("reading configuration")?;
    if let Some(host) = matches.get_one::<String>("host") {
        config.server.host.clone_from(host);
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }

    telemetry::init(config.log_format()).context("installing tracing subscriber")?;
    config.validate().context("validating configuration")?;
    tracing::info!("Configuration loaded for environment {}", config.environment);

    let service = TriageService::from_config(&config)?;
    service.prepare().await;

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid listen host {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);

    let routes = http::routes(service.intake.clone());
    let (bound, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Starting Bug Triage API on {}", bound);
    server.await;

    service.pool().shutdown(SHUTDOWN_GRACE).await;
    tracing::info!("Bug Triage API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
