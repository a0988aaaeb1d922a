use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use medtrack_core::{Controller, Gateway, MedicineClient};

mod config;
mod repl;
mod terminal;
mod transport;

use terminal::TerminalView;
use transport::UreqTransport;

#[derive(Debug, Parser)]
#[command(name = "medtrack", version, about = "Track your medicines from the terminal")]
struct Cli {
    /// TOML config file (defaults to ./medtrack.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root of the API, overriding config and environment
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .try_init()
        .ok();

    let config = config::load(cli.config.as_deref(), cli.base_url.as_deref())?;
    tracing::info!(base_url = %config.base_url, "starting");

    let gateway = Gateway::new(MedicineClient::new(&config.base_url), UreqTransport::new());
    let mut view = TerminalView::new(io::stdin().lock(), io::stdout());
    if io::stdin().is_terminal() {
        view = view.with_secret_reader(terminal::read_hidden);
    }
    let mut app = Controller::new(gateway, view, config);

    // Best effort: unsafe requests still go out with an empty token.
    if let Err(err) = app.gateway_mut().prime_csrf() {
        tracing::warn!(error = %err, "could not obtain an anti-forgery token");
    }
    if let Err(err) = app.start() {
        tracing::debug!(error = %err, "startup probe failed");
    }

    app.view_mut().line("Type `help` for commands.");
    repl::run(&mut app)?;
    Ok(())
}
