#![warn(clippy::nursery, clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pastegate_common::Url;
use pastegate_server::{bind, cleanup, AppState, Config};
use tokio::task;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Opts {
    /// Address to listen on.
    #[clap(long, env = "PASTEGATE_BIND", default_value = "0.0.0.0:8081")]
    bind: SocketAddr,
    /// Public base URL used in links handed out on creation.
    #[clap(long, env = "PASTEGATE_PUBLIC_URL")]
    public_url: Option<Url>,
    /// Honor the `x-test-now-ms` header as the current time.
    #[clap(long, env = "TEST_MODE")]
    test_mode: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let opts = Opts::parse();
    if opts.test_mode {
        warn!("Test mode is on; clients may set the service clock");
    }

    let state = Arc::new(AppState::new(Config {
        public_url: opts.public_url,
        test_mode: opts.test_mode,
    }));

    task::spawn(cleanup(Arc::clone(&state)));

    let (addr, server) = bind(&opts.bind, state, async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Failed to listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    })
    .with_context(|| format!("Failed to bind to {}", opts.bind))?;

    info!("Listening on {}", addr);
    server.await?;
    info!("Shut down");
    Ok(())
}
