//! Signet Web Server
//!
//! Demo server for token-addressed sessions.

use clap::{Parser, ValueEnum};
use signet_core::{init_logging, LogFormat, LoggingConfig};
use signet_web::{SignetServer, WebConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Compact,
    Pretty,
    Json,
}

/// Signet Web Server - sessions addressed by signed tokens or cookies
#[derive(Parser)]
#[command(name = "signet-web")]
#[command(about = "Demo server for signet sessions")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Sessions configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between sweeps of expired sessions
    #[arg(long)]
    purge_interval: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "compact")]
    log_format: Format,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before reading SIGNET_* settings
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let logging = LoggingConfig {
        level: args.log_level.clone(),
        format: match args.log_format {
            Format::Compact => LogFormat::Compact,
            Format::Pretty => LogFormat::Pretty,
            Format::Json => LogFormat::Json,
        },
        ..LoggingConfig::default()
    };
    init_logging(&logging).map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;

    let mut config = WebConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.config {
        config.config_path = Some(path);
    }
    if let Some(secs) = args.purge_interval {
        config.purge_interval_secs = secs;
    }

    info!("Starting signet-web on http://{}", config.address());
    let server = SignetServer::new(config)?;
    server.start().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["signet-web"]);
        assert!(args.host.is_none());
        assert!(args.port.is_none());
        assert_eq!(args.log_level, "info");

        let args = Args::parse_from([
            "signet-web",
            "--host",
            "0.0.0.0",
            "--port",
            "3000",
            "--config",
            "sessions.toml",
            "--log-format",
            "json",
        ]);
        assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(3000));
        assert_eq!(args.config, Some(PathBuf::from("sessions.toml")));
        assert!(matches!(args.log_format, Format::Json));
    }
}
