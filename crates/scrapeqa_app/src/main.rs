mod commands;
mod config;
mod logging;
mod terminal;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use client_logging::{client_error, client_info, short_id};
use scrapeqa_client::{FileIdentityStore, ReqwestService, RuntimeHandle, SessionRuntime};
use scrapeqa_core::{AppState, Msg};

use crate::commands::{parse_line, Command, HELP};
use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};
use crate::logging::LogDestination;
use crate::terminal::TerminalSink;

#[derive(Parser, Debug)]
#[command(name = "scrapeqa", version)]
#[command(about = "Scrape web pages and ask questions about them", long_about = None)]
struct Cli {
    /// RON config file. Missing file means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Backend base URL, e.g. http://127.0.0.1:8000
    #[arg(long)]
    api_base: Option<String>,

    /// File holding the session identifier
    #[arg(long)]
    identity: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogDestination::File)]
    log: LogDestination,

    /// Log at debug level
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.verbose);

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(api_base) = cli.api_base {
        config.api_base_url = api_base;
    }
    if let Some(identity) = cli.identity {
        config.identity_path = identity;
    }
    config.validate()?;

    run(config).await
}

async fn run(config: AppConfig) -> Result<()> {
    let service = ReqwestService::new(&config.service_settings())
        .context("failed to set up the HTTP client")?;
    let identity = FileIdentityStore::open(&config.identity_path);
    client_info!("api {} identity file {:?}", config.api_base_url, identity.path());

    let session = SessionRuntime::new(
        AppState::with_settings(config.controller_settings()),
        Arc::new(service),
        Box::new(identity),
        Box::new(TerminalSink::default()),
        config.runtime_options(),
    );
    spawn_input_reader(session.handle());
    println!("Type `help` for a list of commands.");

    let state = session.run().await;
    if let Some(id) = state.session().identity.as_deref() {
        client_info!("exiting with session {}", short_id(id));
    }
    Ok(())
}

/// Reads commands from stdin on a plain thread; end of input quits.
fn spawn_input_reader(handle: RuntimeHandle) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    client_error!("failed to read input: {}", err);
                    break;
                }
            };
            match parse_line(&line) {
                Ok(None) => {}
                Ok(Some(Command::Dispatch(msg))) => {
                    if !handle.send(msg) {
                        return;
                    }
                }
                Ok(Some(Command::Help)) => println!("{HELP}"),
                Ok(Some(Command::Quit)) => break,
                Err(err) => eprintln!("{err}"),
            }
        }
        handle.send(Msg::ShutdownRequested);
    });
}
