use anyhow::Context;
use clap::Parser;
use colored::*;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use s3drive::store::{MemoryStore, ObjectStore, S3Store};
use s3drive::{DriveConfig, ResourceManager, UserId, shell};

/// A per-user file system shell on top of an S3 bucket
#[derive(Parser, Debug)]
#[command(name = "s3drive", version, about)]
struct Args {
    /// Numeric id of the user whose drive to open
    #[arg(short, long)]
    user: UserId,

    /// Configuration file (defaults to ./s3drive.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Storage provider (aws, minio)
    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    bucket: Option<String>,

    #[arg(long)]
    endpoint_url: Option<String>,

    /// Keep everything in memory instead of talking to a bucket
    #[arg(long)]
    memory: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Run a single command and exit
    #[arg(short, long)]
    command: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = DriveConfig::load(args.config.as_deref()).context("Invalid configuration")?;
    if let Some(provider) = args.provider {
        config.store.provider = provider;
    }
    if let Some(bucket) = args.bucket {
        config.store.bucket = bucket;
    }
    if args.endpoint_url.is_some() {
        config.store.endpoint_url = args.endpoint_url;
    }
    config.validate().context("Invalid configuration")?;

    let store: Arc<dyn ObjectStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else {
        match S3Store::connect(&config.store, config.transfer.part_size).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                eprintln!("{} Failed to initialize S3 client: {:#}", "Error:".red().bold(), e);
                eprintln!("Make sure you have valid credentials configured.");
                std::process::exit(1);
            }
        }
    };
    tracing::debug!(provider = %config.store.provider, bucket = %config.store.bucket, memory = args.memory, "store ready");

    let manager = Arc::new(ResourceManager::from_config(store, &config));
    let mut state = shell::ShellState::new(manager, args.user).with_json(args.json);

    if let Some(line) = args.command {
        return match state.execute(&line).await {
            Err(e) if e.to_string() == "exit" => Ok(()),
            result => result,
        };
    }

    println!("{}", "=".repeat(60).cyan());
    println!("{}", "  s3drive - your files in a bucket".bold().cyan());
    println!("{}", format!("  Signed in as user {}", args.user).cyan());
    println!("{}", "=".repeat(60).cyan());
    println!();
    println!("Type 'help' for available commands or 'exit' to quit");
    println!();

    let completer = shell::ShellCompleter::new(state.completion_cache().clone());
    let mut rl = Editor::new()?;
    rl.set_helper(Some(completer));

    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".s3drive_history");
        p
    });
    if let Some(path) = &history_file {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = state.prompt();

        match rl.readline(&prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());

                if let Err(e) = state.execute(&line).await {
                    if e.to_string() == "exit" {
                        break;
                    }
                    eprintln!("{} {:#}", "Error:".red().bold(), e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red().bold(), err);
                break;
            }
        }
    }

    if let Some(path) = &history_file {
        let _ = rl.save_history(path);
    }

    println!("Goodbye!");
    Ok(())
}
