//! Swapchat terminal client.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use swapchat_app::{Runtime, RuntimeConfig, SessionSelection};
use swapchat_client::{BackendClient, ClientConfig, SocketIoConnector};
use swapchat_core::SystemEnv;
use swapchat_tui::TerminalDriver;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Encrypted one-to-one chat in the terminal.
#[derive(Debug, Parser)]
#[command(name = "swapchat", version, about)]
struct Args {
    /// Backend base URL; the relay is reached at the same host
    #[arg(long, env = "SWAPCHAT_BACKEND_URL", default_value = "http://localhost:8000")]
    backend_url: String,

    /// Login token, as stored in the login cookie
    #[arg(long, env = "SWAPCHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Raw cookie header to take the login token from
    #[arg(long, conflicts_with = "token")]
    cookie: Option<String>,

    /// Open the conversation with this user id on start
    #[arg(long)]
    to: Option<String>,

    /// Log file; the terminal itself is reserved for the UI
    #[arg(long, default_value = "swapchat.log")]
    log_file: PathBuf,
}

fn init_logging(path: &Path) -> WorkerGuard {
    let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().map_or_else(|| "swapchat.log".into(), ToOwned::to_owned);
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("swapchat=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
    guard
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::parse(&args.backend_url)?;
    let relay_url = config.relay_url()?;

    let mut backend = BackendClient::new(config)?;
    if let Some(token) = &args.token {
        backend = backend.with_token(token);
    } else if let Some(cookie) = &args.cookie {
        backend = backend.with_cookie(cookie);
    }

    let mut runtime_config = RuntimeConfig::new(relay_url.as_str());
    runtime_config.initial_selection = args.to.map(|uuid| SessionSelection::DirectLink { uuid });

    info!(backend = %args.backend_url, relay = %relay_url, "starting");
    let driver = TerminalDriver::new(SocketIoConnector::default())?;
    let mut runtime = Runtime::new(driver, backend, SystemEnv, runtime_config);
    runtime.run().await?;
    Ok(())
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = init_logging(&args.log_file);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "swapchat exited with an error");
            eprintln!("swapchat: {err}");
            ExitCode::FAILURE
        },
    }
}
