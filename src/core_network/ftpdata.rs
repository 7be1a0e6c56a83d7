//! Data-connection lifecycle: establish the second TCP stream, validate its
//! peer, run the transfer body on its own worker task.
//!
//! The worker owns the whole transfer; the session only sees the state word,
//! the abort handle and the published record it reaps after `finished`. The
//! completion reply (226/425/426) is written by the worker itself so the
//! control loop can keep reading commands while data moves.

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::constants::BIND_RETRIES;
use crate::core_rpa::{lease_to_socket, PortBroker};
use crate::core_stream::SharedWriter;
use crate::core_timeout::TimeoutScheduler;
use crate::helpers::send_response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XferState {
    AwaitingPeer,
    Transferring,
    Finished,
}

/// How the data connection is established.
pub enum DataMode {
    /// Server connects out to the validated PORT/EPRT target.
    Active { target: SocketAddr },
    /// Client connects in to the listener PASV/EPSV bound earlier.
    Passive { listener: TcpListener },
}

/// What the transfer is, for replies and the transfer log.
pub struct TransferInfo {
    pub vpath: String,
    pub ascii: bool,
    pub outgoing: bool,
    /// Listings are not worth a transfer-log line.
    pub log: bool,
}

/// Published by the worker at completion, read once by the session at reap.
pub struct TransferRecord {
    pub ok: bool,
    pub bytes: u64,
    pub seconds: u64,
    pub vpath: String,
    pub ascii: bool,
    pub outgoing: bool,
    pub log: bool,
}

/// Everything the worker borrows from the session's world, captured at start.
pub struct TransferEnv {
    pub control: SharedWriter,
    pub peer_ip: IpAddr,
    pub local_ip: IpAddr,
    pub source_port: u16,
    pub broker: Arc<PortBroker>,
    pub scheduler: TimeoutScheduler,
    pub pasv_timeout: Duration,
}

/// The body runs once the peer is validated; it returns the byte count moved.
pub type TransferBody = Box<
    dyn FnOnce(TcpStream) -> Pin<Box<dyn Future<Output = io::Result<u64>> + Send>> + Send,
>;

pub struct DataTransfer {
    state: Arc<StdMutex<XferState>>,
    abort: Arc<Notify>,
    worker: JoinHandle<Option<TransferRecord>>,
}

impl DataTransfer {
    /// Spawn the transfer worker. The caller has already verified no other
    /// transfer is live on this session.
    pub fn start(env: TransferEnv, mode: DataMode, info: TransferInfo, body: TransferBody) -> Self {
        let state = Arc::new(StdMutex::new(XferState::AwaitingPeer));
        let abort = Arc::new(Notify::new());
        let worker = tokio::spawn(run_transfer(
            env,
            mode,
            info,
            body,
            Arc::clone(&state),
            Arc::clone(&abort),
        ));
        Self {
            state,
            abort,
            worker,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(
            *self.state.lock().unwrap(),
            XferState::AwaitingPeer | XferState::Transferring
        )
    }

    pub fn is_finished(&self) -> bool {
        *self.state.lock().unwrap() == XferState::Finished
    }

    /// Force the worker off its socket; it finishes with a 426 reply. The
    /// permit is stored, so an abort delivered before the worker reaches its
    /// await point still lands.
    pub fn abort(&self) {
        self.abort.notify_one();
    }

    /// Join the worker and take its record. `None` means the transfer never
    /// got far enough to publish one.
    pub async fn join(self) -> Option<TransferRecord> {
        self.worker.await.unwrap_or(None)
    }
}

async fn run_transfer(
    env: TransferEnv,
    mode: DataMode,
    info: TransferInfo,
    body: TransferBody,
    state: Arc<StdMutex<XferState>>,
    abort: Arc<Notify>,
) -> Option<TransferRecord> {
    let started = Instant::now();

    let finish = |ok: bool, bytes: u64| TransferRecord {
        ok,
        bytes,
        seconds: started.elapsed().as_secs(),
        vpath: info.vpath.clone(),
        ascii: info.ascii,
        outgoing: info.outgoing,
        log: info.log,
    };

    let stream = tokio::select! {
        established = establish(&env, mode) => match established {
            Ok(stream) => stream,
            Err(err) => {
                debug!("data connection for {} failed: {}", info.vpath, err);
                let _ = send_response(&env.control, "425 Can not build data connection.").await;
                *state.lock().unwrap() = XferState::Finished;
                return Some(finish(false, 0));
            }
        },
        _ = abort.notified() => {
            let _ = send_response(&env.control, "426 Connection closed; transfer aborted.").await;
            *state.lock().unwrap() = XferState::Finished;
            return Some(finish(false, 0));
        }
    };

    // Bounce defense, second line: whoever ends up on the data connection
    // must be the control peer.
    match stream.peer_addr() {
        Ok(peer) if peer.ip() == env.peer_ip => {}
        Ok(peer) => {
            warn!(
                "data connection from foreign address {} refused (control peer {})",
                peer, env.peer_ip
            );
            drop(stream);
            let _ = send_response(&env.control, "426 Connection closed; transfer aborted.").await;
            *state.lock().unwrap() = XferState::Finished;
            return Some(finish(false, 0));
        }
        Err(err) => {
            debug!("data connection peer lookup failed: {}", err);
            let _ = send_response(&env.control, "426 Connection closed; transfer aborted.").await;
            *state.lock().unwrap() = XferState::Finished;
            return Some(finish(false, 0));
        }
    }

    *state.lock().unwrap() = XferState::Transferring;

    let outcome = tokio::select! {
        result = body(stream) => Some(result),
        _ = abort.notified() => None,
    };

    let (ok, bytes, reply) = match outcome {
        Some(Ok(bytes)) => (true, bytes, "226 Transfer complete."),
        Some(Err(err)) => {
            debug!("transfer of {} failed: {}", info.vpath, err);
            (false, 0, "426 Connection closed; transfer aborted.")
        }
        None => (false, 0, "426 Connection closed; transfer aborted."),
    };
    let _ = send_response(&env.control, reply).await;
    *state.lock().unwrap() = XferState::Finished;
    Some(finish(ok, bytes))
}

async fn establish(env: &TransferEnv, mode: DataMode) -> io::Result<TcpStream> {
    match mode {
        DataMode::Passive { listener } => accept_one(env, listener).await,
        DataMode::Active { target } => {
            let socket = active_source(env).await?;
            socket.connect(target).await
        }
    }
}

/// Accept exactly one connection within the passive-accept timeout. The
/// listener is dropped on the way out, success or not.
async fn accept_one(env: &TransferEnv, listener: TcpListener) -> io::Result<TcpStream> {
    let expired = Arc::new(Notify::new());
    let timer = {
        let expired = Arc::clone(&expired);
        env.scheduler
            .schedule(env.pasv_timeout, move || expired.notify_one())
    };
    let accepted = tokio::select! {
        accepted = listener.accept() => accepted.map(|(stream, _)| stream),
        _ = expired.notified() => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "passive accept timed out",
        )),
    };
    env.scheduler.cancel(timer);
    accepted
}

/// A socket bound to the control connection's local address for the outgoing
///// data connection: leased from the port service when the configured source
/// port is privileged, otherwise bound directly, degrading to an ephemeral
/// port when the fixed one is not available.
async fn active_source(env: &TransferEnv) -> io::Result<TcpSocket> {
    if env.source_port < 1024 {
        let addr = SocketAddr::new(env.local_ip, env.source_port);
        match env.broker.acquire(addr).await {
            Ok(fd) => return lease_to_socket(fd),
            Err(err) => debug!("port lease unavailable, binding directly: {}", err),
        }
    }

    let mut port = env.source_port;
    let mut attempt = 0;
    loop {
        let socket = match env.local_ip {
            IpAddr::V4(_) => TcpSocket::new_v4()?,
            IpAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        match socket.bind(SocketAddr::new(env.local_ip, port)) {
            Ok(()) => return Ok(socket),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied && port != 0 => {
                debug!("bind to source port {} denied, using ephemeral", port);
                port = 0;
            }
            Err(err) if err.kind() == io::ErrorKind::AddrInUse && attempt + 1 < BIND_RETRIES => {
                attempt += 1;
                sleep(Duration::from_secs(1)).await;
            }
            Err(err) => return Err(err),
        }
    }
}
