use clap::Parser;
use fetch_bridge::config::Config;
use fetch_bridge::logging::{CustomLogger, init_fallback, parse_log_format, parse_log_level};
use fetch_bridge::server::ProxyServer;
use log::info;
use std::path::Path;
use tokio::signal;

#[derive(Parser)]
#[clap(
    version,
    about = "Proxy endpoint that fetches remote URLs or local files described by JSON queries"
)]
struct Args {
    #[clap(short, long, value_name = "FILE", help = "Configuration file path")]
    config: Option<String>,

    #[clap(short, long, value_name = "ADDR", help = "Listen address (e.g., 127.0.0.1:8080), overrides the config file")]
    listen: Option<String>,

    #[clap(long, value_name = "FILE", help = "Generate a sample configuration file")]
    generate_config: Option<String>,

    #[clap(long, value_name = "LEVEL", help = "Log level when the config has no logging section: trace, debug, info, warn, error")]
    log_level: Option<String>,

    #[clap(long, value_name = "FORMAT", help = "Log format when the config has no logging section: text or json")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(config_file) = args.generate_config {
        std::fs::write(&config_file, SAMPLE_CONFIG)?;
        println!("Sample configuration file generated: {}", config_file);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(config_file) => {
            if !Path::new(config_file).exists() {
                return Err(format!("Configuration file not found: {}", config_file).into());
            }
            Config::from_file(config_file)?
        }
        None => Config::default(),
    };

    if let Some(listen) = &args.listen {
        config.listen_addr = listen.parse()?;
    }

    init_logging(&config, &args)?;

    info!("Starting fetch-bridge...");
    let server = ProxyServer::new(config)?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    info!("fetch-bridge stopped");
    Ok(())
}

fn init_logging(config: &Config, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &args.log_level {
        parse_log_level(level)?;
    }
    if let Some(format) = &args.log_format {
        parse_log_format(format)?;
    }

    match &config.logging {
        Some(logging) => CustomLogger::init(logging.clone()),
        None => init_fallback(args.log_level.as_deref(), args.log_format.as_deref()),
    }
}

const SAMPLE_CONFIG: &str = r#"{
  "listen_addr": "127.0.0.1:8080",
  "proxy_path": "/proxy",
  "request_timeout_secs": 30,
  "instances": [
    {
      "id": "public-api",
      "url": "https://api.example.com",
      "custom_headers": {
        "Accept": "application/json"
      },
      "secure_query_fields": {
        "api_key": "replace-me"
      }
    },
    {
      "id": "internal",
      "url": "https://internal.example.com:8443",
      "server_name": "internal.example.com",
      "tls_auth_with_ca_cert": true,
      "tls_ca_cert": "-----BEGIN CERTIFICATE-----\n...\n-----END CERTIFICATE-----\n",
      "basic_auth_enabled": true,
      "user_name": "reader",
      "password": "replace-me",
      "timeout_secs": 10
    }
  ]
}
"#;
