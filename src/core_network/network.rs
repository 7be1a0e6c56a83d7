//! Accept loop: one task per control connection, admission capped by a
//! semaphore sized from `max_sessions`.

use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;

use crate::config::Config;
use crate::core_log::xferlog::Xferlog;
use crate::core_rpa::rpa::PortBroker;
use crate::core_timeout::timeout::TimeoutScheduler;
use crate::session::Session;

/// Shared per-server state handed to every session.
#[derive(Clone)]
pub struct ServerCtx {
    pub config: Arc<Config>,
    pub scheduler: TimeoutScheduler,
    pub broker: Arc<PortBroker>,
    pub xferlog: Arc<Xferlog>,
}

/// Run the accept loop until `shutdown` fires, then wait for live sessions
/// to wind down.
pub async fn start_server(
    ctx: ServerCtx,
    listener: TcpListener,
    shutdown: Arc<Notify>,
) -> Result<()> {
    let max_sessions = ctx.config.server.max_sessions;
    let permits = if max_sessions == 0 {
        Semaphore::MAX_PERMITS
    } else {
        max_sessions
    };
    let limiter = Arc::new(Semaphore::new(permits));
    let mut sessions = JoinSet::new();

    info!("listening on {}", listener.local_addr()?);
    loop {
        let permit = match Arc::clone(&limiter).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.notified() => break,
        };
        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("accept failed: {}", err);
                continue;
            }
        };
        info!("connection from {}", peer);
        let ctx = ctx.clone();
        sessions.spawn(async move {
            Session::run(stream, ctx).await;
            drop(permit);
        });
        // Reap whatever has already finished so the set stays small.
        while sessions.try_join_next().is_some() {}
    }

    info!("shutting down, waiting for {} session(s)", sessions.len());
    while sessions.join_next().await.is_some() {}
    Ok(())
}
