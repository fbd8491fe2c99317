//! Search Client Mock - CLI Entry Point
//!
//! Validates mock configuration files and dry-runs requests against them.

use anyhow::Result;
use clap::Parser;
use search_client_mock::{Mock, MockConfig, RawRequest, Transport};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "search-client-mock",
    about = "Mock transport for search-engine clients - validate pattern files and dry-run requests",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "search-mock.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Method of the request to dry-run
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Path of the request to dry-run (e.g. "/books/_search")
    #[arg(short, long)]
    path: Option<String>,

    /// Query string of the request, without the leading '?'
    #[arg(short, long)]
    query: Option<String>,

    /// Request body
    #[arg(short, long, conflicts_with = "body_file")]
    body: Option<String>,

    /// Read the request body from a file
    #[arg(long, value_name = "FILE")]
    body_file: Option<PathBuf>,

    /// Content-Type of the request body
    #[arg(long, default_value = "application/json")]
    content_type: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        let default_config = include_str!("../demos/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    let config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockConfig::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration (no patterns)");
        MockConfig::default()
    };

    if args.validate {
        config.validate()?;
        println!(
            "Configuration is valid ({} patterns defined)",
            config.patterns.len()
        );
        return Ok(());
    }

    let mock = Mock::from_config(&config)?;

    let Some(path) = args.path else {
        println!(
            "Loaded {} patterns; pass --path to dry-run a request",
            config.patterns.len()
        );
        return Ok(());
    };

    let mut request = RawRequest::new(args.method, path);
    if let Some(query) = args.query {
        request = request.with_querystring(query);
    }
    let body = match args.body_file {
        Some(file) => Some(tokio::fs::read(&file).await?),
        None => args.body.map(String::into_bytes),
    };
    if let Some(body) = body {
        request = request
            .with_header("content-type", args.content_type)
            .with_body(body);
    }

    let response = mock.get_connection().request(request, None).await?;

    println!("{}", response.status_code);
    for (name, value) in &response.headers {
        println!("{}: {}", name, value);
    }
    println!();
    match response.body_json() {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", response.body_text()),
    }

    Ok(())
}
