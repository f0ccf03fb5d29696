//! CLI for nai-gateway.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nai_gateway::generation::supported_models;
use nai_gateway::{init_logging, serve, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nai-gateway")]
#[command(about = "OpenAI-compatible gateway for NovelAI image generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve(ServeArgs),

    /// List routable models and their payload schema
    Models,
}

#[derive(Args)]
struct ServeArgs {
    /// YAML configuration file
    #[arg(short, long, default_value = ".env", env = "NAI_GATEWAY_CONFIG")]
    config: PathBuf,

    /// Listen address, overrides `server.addr`
    #[arg(long)]
    addr: Option<String>,

    /// Log level, overrides `logging.level`
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for daily-rolling log files
    #[arg(long)]
    log_dir: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            run_server(args).await?;
        }
        Commands::Models => {
            list_models(cli.json)?;
        }
    }

    Ok(())
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }
    if args.log_level.is_some() {
        config.logging.level = args.log_level;
    }
    if args.log_dir.is_some() {
        config.logging.dir = args.log_dir;
    }
    if args.json_logs {
        config.logging.json = true;
    }

    let _guard = init_logging(config.logging_config());
    serve(&config).await.context("gateway stopped")?;
    Ok(())
}

fn list_models(json_output: bool) -> anyhow::Result<()> {
    let models = supported_models();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
    } else {
        println!("Routable models:\n");
        for route in &models {
            println!("  {} ({})", route.model, route.schema);
        }
        println!("\nAny other model name is sent as nai-diffusion-3 (v3).");
    }

    Ok(())
}
