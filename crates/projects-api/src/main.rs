//! Projects API server
//!
//! Serves the project registry over HTTP.

use anyhow::Context;
use projects_api::{config::ApiConfig, start_server};
use std::env;
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let config = if args.len() > 2 && args[1] == "--config" {
        let config_path = &args[2];
        ApiConfig::from_file(config_path)
            .with_context(|| format!("loading config file {}", config_path))?
    } else if args.len() > 1 && args[1] == "--help" {
        print_help();
        return Ok(());
    } else if args.len() > 1 {
        print_help();
        anyhow::bail!("unrecognized arguments: {}", args[1..].join(" "));
    } else {
        ApiConfig::from_env().context("reading configuration from environment")?
    };

    start_server(config).await.context("running projects API")?;

    Ok(())
}

fn print_help() {
    println!("projects-api - ML project metadata registry");
    println!();
    println!("USAGE:");
    println!("    projects-api [--config <path-to-config.toml>]");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>    Load configuration from TOML file");
    println!("    --help             Print this help message");
    println!();
    println!("ENVIRONMENT (used when no config file is given, .env is honored):");
    println!("    DATA_DIR                 Static file root (default: /mnt/external/data/)");
    println!("    SERVE_DATA               Serve DATA_DIR under /data/ (default: false)");
    println!("    REDIS_HOST               Redis host (default: localhost)");
    println!("    REDIS_PORT               Redis port (default: 6379)");
    println!("    REDIS_PASSWORD           Redis password (default: none)");
    println!("    REDIS_POOL_SIZE          Maximum pooled connections (default: 100)");
    println!("    BIND_ADDRESS             Address to bind (default: 0.0.0.0)");
    println!("    PORT                     Port to listen on (default: 12345)");
    println!("    LOG_LEVEL                error, info or debug (default: info)");
    println!("    RECONCILE_INTERVAL_SECS  Index reconcile period, 0 disables (default: 0)");
    println!("    RUST_LOG                 Overrides LOG_LEVEL with tracing directives");
    println!();
}
