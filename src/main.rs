use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tirc::config::{self, AppConfig};
use tirc::irc::{builders, Client, ConnectionState, Message, Prefix};
use tirc::logging::Transcript;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How long to wait for the server to close the session after QUIT.
const QUIT_GRACE: Duration = Duration::from_secs(3);

/// Connect to an IRC server, join the configured channels, and print
/// everything the server sends.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to <config dir>/tirc/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Server hostname.
    #[arg(long)]
    host: Option<String>,
    /// Server port.
    #[arg(long)]
    port: Option<u16>,
    /// Username.
    #[arg(long)]
    user: Option<String>,
    /// Nick.
    #[arg(long)]
    nick: Option<String>,
    /// Real name.
    #[arg(long)]
    name: Option<String>,
    /// Server password.
    #[arg(long, env = "TIRC_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl Cli {
    /// Command-line values take precedence over the config file.
    fn apply(self, config: &mut AppConfig) {
        let server = &mut config.server;
        if let Some(host) = self.host {
            server.host = host;
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(user) = self.user {
            server.username = user;
        }
        if let Some(nick) = self.nick {
            server.nickname = nick;
        }
        if let Some(name) = self.name {
            server.realname = name;
        }
        if let Some(password) = self.password {
            server.password = password;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    cli.apply(&mut cfg);

    let (inbound_tx, inbound_rx) = mpsc::channel(cfg.client.inbound_capacity.max(1));
    let reader = tokio::spawn(consume(inbound_rx, Transcript::new(&cfg.logging)));

    let server = &cfg.server;
    let mut client =
        Client::new(server.identity(), &server.realname).with_options(cfg.client.options());
    let addr = server.address();
    client
        .connect(&addr, &server.password, inbound_tx)
        .await
        .with_context(|| format!("Failed to connect to {addr}"))?;

    if !server.channels.is_empty() {
        let join = builders::join::<String>(Prefix::default(), &server.channels, &[])?;
        client.send(join).await?;
    }

    let mut state = client.watch_state();
    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        () = disconnected(&mut state) => false,
    };

    if interrupted {
        info!("interrupted, quitting");
        if let Err(e) = client.quit(&server.quit_message).await {
            warn!(error = %e, "could not send QUIT");
        }
        let closed = tokio::time::timeout(QUIT_GRACE, disconnected(&mut state)).await;
        if closed.is_err() {
            warn!("server did not close the session, disconnecting");
        }
    } else {
        info!("server closed the connection");
    }

    client.disconnect().await?;
    reader.await?;
    Ok(())
}

async fn disconnected(state: &mut watch::Receiver<ConnectionState>) {
    let _ = state
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await;
}

/// Drain the inbound sink until the listener closes it.
async fn consume(mut inbound: mpsc::Receiver<Message>, mut transcript: Transcript) {
    while let Some(msg) = inbound.recv().await {
        println!("[{}] R: {}", chrono::Local::now().format("%H:%M:%S"), msg);
        transcript.record(&msg);
    }
}
