use clap::{Parser, Subcommand};
use modem_bridge::config::{get_default_config_path, ConfigLoader};
use modem_bridge::{logging, AppError, AppResult, Config, ModemService, SendSmsRequest};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::info;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "modem-bridge",
    version,
    about = "Query and drive GSM/LTE modems attached as serial devices.",
    long_about = "Discovers AT-command modems on serial ports and exposes identity, signal and SMS operations. Every command prints JSON on stdout; logs go to stderr."
)]
struct Args {
    /// Configuration file (overrides the standard search path).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `modem_bridge=trace`. `RUST_LOG` still wins.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover modems and report which were registered.
    Scan,
    /// List registered modems.
    List,
    /// Manufacturer, model, IMEI, IMSI, operator and own number.
    Info { port: String },
    /// Signal strength.
    Signal { port: String },
    /// SMS storage operations.
    Sms {
        #[command(subcommand)]
        action: SmsAction,
    },
    /// Send a raw AT command and print the reply.
    At { port: String, command: String },
    /// Stream raw device chatter until interrupted.
    Watch {
        /// Queue depth for this subscriber.
        #[arg(long)]
        buffer: Option<usize>,
    },
    /// Print the effective configuration, or write it to a file.
    Config {
        /// Write to this path instead of printing.
        #[arg(long)]
        write: Option<PathBuf>,
        /// Write to the default user config location.
        #[arg(long, conflicts_with = "write")]
        init: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SmsAction {
    /// List stored messages, concatenated parts merged.
    List { port: String },
    /// Send a message, split into parts when it is long.
    Send {
        port: String,
        number: String,
        text: String,
    },
    /// Delete messages by storage index.
    Delete {
        port: String,
        #[arg(required = true)]
        indices: Vec<u32>,
    },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    message: String,
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let body = ErrorBody {
                status: "error",
                error: ErrorDetail {
                    kind: e.kind(),
                    message: e.to_string(),
                },
            };
            match serde_json::to_string_pretty(&body) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> AppResult<ConfigLoader> {
    let mut loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(level) = &args.log_level {
        loader.config.logging.level = level.clone();
    }
    Ok(loader)
}

async fn run(args: Args) -> AppResult<()> {
    let loader = load_config(&args)?;
    logging::init(&loader.config().logging);
    if let Some(path) = &loader.config_path {
        info!(path = %path.display(), "configuration loaded");
    }

    if let Command::Config { write, init } = &args.command {
        let target = if *init {
            Some(get_default_config_path().ok_or_else(|| {
                AppError::InvalidInput("no user configuration directory".to_string())
            })?)
        } else {
            write.clone()
        };
        return match target {
            Some(path) => {
                loader.save_to(&path)?;
                print_json(&serde_json::json!({ "written": path }))
            }
            None => print_toml(loader.config()),
        };
    }

    let service = ModemService::from_config(loader.into_config())?;
    let scanned = service.scan().await?;

    let result = match args.command {
        Command::Scan => print_json(&scanned),
        Command::List => print_json(&service.list()),
        Command::Info { port } => print_json(&service.info(&port).await?),
        Command::Signal { port } => print_json(&service.signal(&port).await?),
        Command::Sms { action } => match action {
            SmsAction::List { port } => print_json(&service.list_sms(&port).await?),
            SmsAction::Send { port, number, text } => {
                let sent = service
                    .send_sms(&port, SendSmsRequest { number, text })
                    .await?;
                print_json(&sent)
            }
            SmsAction::Delete { port, indices } => {
                print_json(&service.delete_sms(&port, indices).await?)
            }
        },
        Command::At { port, command } => print_json(&service.raw_command(&port, &command).await?),
        Command::Watch { buffer } => watch(&service, buffer).await,
        Command::Config { .. } => Ok(()),
    };

    service.shutdown().await?;
    result
}

/// Print every event line until Ctrl+C, rescanning in the background.
async fn watch(service: &ModemService, buffer: Option<usize>) -> AppResult<()> {
    let (mut rx, unsubscribe) = match buffer {
        Some(depth) => service.pool().events().subscribe(depth),
        None => service.subscribe(),
    };
    let scanner = service
        .config()
        .serial
        .auto_scan
        .then(|| service.spawn_auto_scan());
    info!(devices = service.list().len(), "watching");

    loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => println!("{line}"),
                None => break,
            },
            _ = signal::ctrl_c() => break,
        }
    }

    unsubscribe.cancel();
    if let Some(handle) = scanner {
        handle.abort();
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_toml(config: &Config) -> AppResult<()> {
    let text = toml::to_string_pretty(config)
        .map_err(|e| AppError::Config(modem_bridge::ConfigError::Render(e)))?;
    print!("{text}");
    Ok(())
}
