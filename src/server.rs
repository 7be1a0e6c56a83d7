//! Server bootstrap: shared state, signal handling, and the two entry
//! points (standalone accept loop, inetd-style single session).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;

use crate::config::Config;
use crate::constants::RPA_SERVICE;
use crate::core_log::xferlog::Xferlog;
use crate::core_network::{network, ServerCtx};
use crate::core_rpa::rpa::PortBroker;
use crate::core_timeout::timeout::TimeoutScheduler;
use crate::session::Session;

async fn build_ctx(config: Config) -> ServerCtx {
    let xferlog = Xferlog::open(&config.server.xferlog_path).await;
    let broker = PortBroker::open(Path::new(&config.server.rpad_dir), RPA_SERVICE);
    ServerCtx {
        config: Arc::new(config),
        scheduler: TimeoutScheduler::new(),
        broker: Arc::new(broker),
        xferlog: Arc::new(xferlog),
    }
}

/// Standalone mode: bind, accept, serve until SIGINT/SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let bind_addr = format!(
        "{}:{}",
        config.server.listen_address, config.server.listen_port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    let ctx = build_ctx(config).await;

    // SIGHUP rotates the transfer log.
    let mut hup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    let xferlog = Arc::clone(&ctx.xferlog);
    tokio::spawn(async move {
        while hup.recv().await.is_some() {
            info!("SIGHUP received, reopening transfer log");
            xferlog.reopen().await;
        }
    });

    let shutdown = Arc::new(Notify::new());
    let mut term = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            info!("shutdown signal received");
            shutdown.notify_one();
        });
    }

    network::start_server(ctx, listener, shutdown).await
}

/// Inetd mode: the control connection is already on fd 0.
pub async fn serve_one(config: Config) -> Result<()> {
    use std::os::unix::io::FromRawFd;

    // Inherited from the superserver, which owns no other reference to it.
    let std_stream = unsafe { std::net::TcpStream::from_raw_fd(0) };
    std_stream
        .set_nonblocking(true)
        .context("fd 0 is not a socket")?;
    let stream = TcpStream::from_std(std_stream).context("fd 0 is not a TCP socket")?;

    let ctx = build_ctx(config).await;
    Session::run(stream, ctx).await;
    Ok(())
}
