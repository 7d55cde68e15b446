//! shadowfax relay daemon.
//!
//! Serves the three relay endpoints over HTTP. Deployments are expected to
//! terminate TLS in front of this listener; clients refuse to bootstrap the
//! server key over plain HTTP on their side.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use shadowfax_crypto::{KeyPair, PrivateKey, PublicKey, PUBLIC_KEY_SIZE};
use shadowfax_server::{router, ServerState};
use shadowfax_store::MailboxStore;

/// shadowfax relay daemon
///
/// Stores sealed messages until their recipients drain them.
#[derive(Parser, Debug)]
#[command(name = "sfd")]
#[command(version, about, long_about = None)]
struct Args {
    /// HTTP listen address
    #[arg(long, env = "SFD_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    http: SocketAddr,

    /// Server key pair file (created if not exists)
    #[arg(long, env = "SFD_KEYPAIR", default_value = "sfd.key")]
    keypair: PathBuf,

    /// Message store database file
    #[arg(long, env = "SFD_DBFILE", default_value = "sfd.db")]
    dbfile: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SFD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, env = "SFD_LOG_FORMAT", default_value = "plain")]
    log_format: String,
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("sled=warn".parse()?);

    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .json()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }

    Ok(())
}

/// Load the server key pair, generating and persisting a fresh one if the
/// file does not exist yet. Layout: 32 bytes public || 32 bytes private,
/// mode 0600.
fn load_or_generate_keypair(path: &Path) -> Result<KeyPair> {
    if path.exists() {
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read key pair file {}", path.display()))?;
        anyhow::ensure!(
            bytes.len() == PUBLIC_KEY_SIZE * 2,
            "key pair file {} has {} bytes, expected {}",
            path.display(),
            bytes.len(),
            PUBLIC_KEY_SIZE * 2
        );
        let public = PublicKey::from_bytes(&bytes[..PUBLIC_KEY_SIZE])?;
        let private = PrivateKey::from_bytes(&bytes[PUBLIC_KEY_SIZE..])?;
        return Ok(KeyPair::new(public, private));
    }

    let keypair = KeyPair::generate();
    let mut bytes = Vec::with_capacity(PUBLIC_KEY_SIZE * 2);
    bytes.extend_from_slice(keypair.public_key().as_bytes());
    bytes.extend_from_slice(keypair.private_key().as_bytes());
    std::fs::write(path, &bytes)
        .with_context(|| format!("cannot write key pair file {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    info!(path = %path.display(), "generated new server key pair");
    Ok(keypair)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, &args.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        http = %args.http,
        dbfile = %args.dbfile.display(),
        "Starting shadowfax relay"
    );

    let keypair = load_or_generate_keypair(&args.keypair)?;
    info!(public_key = %keypair.public_key(), "server identity loaded");

    let db = sled::open(&args.dbfile)
        .with_context(|| format!("cannot open message store {}", args.dbfile.display()))?;
    let store = MailboxStore::open(&db).context("cannot open mailbox store")?;

    let state = Arc::new(ServerState::new(keypair, store));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(args.http)
        .await
        .with_context(|| format!("cannot bind {}", args.http))?;
    info!(addr = %args.http, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await
        .context("server error")?;

    info!("shadowfax relay stopped");
    Ok(())
}
