//! Veratui - Veracode terminal browser
//!
//! Launches directly into the interactive session.
use clap::Parser;
use log::{LevelFilter, info};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use veracode_api::VeracodeClient;
use veratui::fetch::{DEFAULT_WORKERS, FetchDispatcher};
use veratui::terminal::{Tui, install_panic_hook};
use veratui::{Result, Session, app, cli, credentials};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // The terminal belongs to the UI, so logs only go to a file.
    init_logging(args.debug_log.as_deref())?;
    info!("Veratui - Veracode terminal browser");

    let veracode_credentials = credentials::load_credentials(args.config.as_deref())?;
    let config = credentials::create_veracode_config(veracode_credentials, args.region);
    let client = Arc::new(VeracodeClient::new(config)?);

    let mut session = Session::new(args.page_size);
    session.start();
    let mut dispatcher = FetchDispatcher::new(client, DEFAULT_WORKERS);

    install_panic_hook();
    let mut tui = Tui::new()?;
    tui.enter()?;
    let result = app::run(&mut tui, &mut session, &mut dispatcher).await;
    tui.exit()?;

    info!("Veratui exiting");
    result
}

fn init_logging(path: Option<&Path>) -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"));
    match path {
        Some(path) => {
            let file = File::create(path)?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        None => {
            builder.filter_level(LevelFilter::Off);
        }
    }
    builder.init();
    Ok(())
}
