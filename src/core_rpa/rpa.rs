//! Reserved-port allocation client.
//!
//! Active-mode data connections traditionally originate from the ftp-data
//! port, which an unprivileged server process cannot bind itself. A
//! cooperating allocation daemon owns that right and hands bound sockets
//! over IPC; this is the client side. The rendezvous directory holds one
//! entry per transport under `<dir>/<service>/`; the first transport that
//! opens is pinned and reused for the process lifetime, with one
//! reopen-and-retry when it fails mid-session. Callers treat every failure
//! here as soft and fall back to an ordinary ephemeral bind.

use std::io::{self, IoSliceMut, Write};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use nix::cmsg_space;
use nix::libc;
use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum RpaError {
    #[error("no allocation service transport available")]
    NoTransport,
    #[error("{0} transport not supported on this platform")]
    Unsupported(&'static str),
    #[error("allocation service refused the request (status {0})")]
    Rejected(i32),
    #[error("allocation service returned no descriptor")]
    NoDescriptor,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Wire size of one request: the largest socket address form, family first.
pub const REQUEST_LEN: usize = 28;

/// Build the fixed-size address image the allocation daemon expects. The
/// layout matches the kernel socket address structures: native-endian family,
/// big-endian port, then the address bytes at their usual offsets.
pub fn encode_request(addr: &SocketAddr) -> [u8; REQUEST_LEN] {
    let mut buf = [0u8; REQUEST_LEN];
    match addr {
        SocketAddr::V4(v4) => {
            buf[0..2].copy_from_slice(&(libc::AF_INET as u16).to_ne_bytes());
            buf[2..4].copy_from_slice(&v4.port().to_be_bytes());
            buf[4..8].copy_from_slice(&v4.ip().octets());
        }
        SocketAddr::V6(v6) => {
            buf[0..2].copy_from_slice(&(libc::AF_INET6 as u16).to_ne_bytes());
            buf[2..4].copy_from_slice(&v6.port().to_be_bytes());
            // Flow information stays zero.
            buf[8..24].copy_from_slice(&v6.ip().octets());
        }
    }
    buf
}

/// One IPC primitive able to return a bound socket descriptor.
pub trait LeaseTransport: Send {
    fn name(&self) -> &'static str;

    /// Request a socket bound to `addr`. The port in `addr` is a hint; the
    /// service decides which reserved port it actually binds.
    fn acquire(&mut self, addr: &SocketAddr) -> Result<OwnedFd, RpaError>;
}

/// Domain-socket transport: stream the request, read a native-int status
/// with the descriptor attached as ancillary rights.
struct UnixLease {
    stream: StdUnixStream,
}

impl UnixLease {
    fn open(base: &Path) -> Result<Self, RpaError> {
        let path = base.join("unix");
        let stream = StdUnixStream::connect(&path)?;
        debug!("port lease: connected to {}", path.display());
        Ok(Self { stream })
    }
}

impl LeaseTransport for UnixLease {
    fn name(&self) -> &'static str {
        "unix"
    }

    fn acquire(&mut self, addr: &SocketAddr) -> Result<OwnedFd, RpaError> {
        self.stream.write_all(&encode_request(addr))?;

        let mut status = [0u8; 4];
        let mut cmsg = cmsg_space!([RawFd; 1]);
        let nread;
        let mut passed: Option<RawFd> = None;
        {
            let mut iov = [IoSliceMut::new(&mut status)];
            let msg = recvmsg::<()>(
                self.stream.as_raw_fd(),
                &mut iov,
                Some(&mut cmsg),
                MsgFlags::empty(),
            )
            .map_err(io::Error::from)?;
            nread = msg.bytes;
            for c in msg.cmsgs() {
                if let ControlMessageOwned::ScmRights(fds) = c {
                    passed = fds.into_iter().next();
                }
            }
        }

        // From here the descriptor is ours to close.
        // SAFETY: the rights message transferred ownership to this process.
        let fd = passed.map(|raw| unsafe { OwnedFd::from_raw_fd(raw) });

        if nread < status.len() {
            return Err(RpaError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "allocation service closed the connection",
            )));
        }
        let status = i32::from_ne_bytes(status);
        if status < 0 {
            return Err(RpaError::Rejected(status));
        }
        fd.ok_or(RpaError::NoDescriptor)
    }
}

fn probe_legacy(base: &Path, kind: &'static str) -> Option<RpaError> {
    base.join(kind)
        .exists()
        .then(|| RpaError::Unsupported(kind))
}

/// Probe the rendezvous directory in preference order. Doors and STREAMS
/// pipes are SVR4 primitives; their entries are still checked first so a
/// service set up that way gets reported instead of silently skipped.
fn open_transport(base: &Path) -> Result<Box<dyn LeaseTransport>, RpaError> {
    for kind in ["door", "pipe"] {
        if let Some(err) = probe_legacy(base, kind) {
            warn!("port lease: {}", err);
        }
    }
    match UnixLease::open(base) {
        Ok(transport) => Ok(Box::new(transport)),
        Err(err) => {
            debug!("port lease: unix transport unavailable: {}", err);
            Err(RpaError::NoTransport)
        }
    }
}

/// Process-wide handle to the allocation service. Requests are serialized so
/// descriptor-passing replies can never interleave.
pub struct PortBroker {
    rendezvous: PathBuf,
    transport: Mutex<Option<Box<dyn LeaseTransport>>>,
}

impl PortBroker {
    /// Connect to the allocation service for `service`. Absence is soft:
    /// the broker stays usable and every acquire reports failure, which
    /// callers answer with an ephemeral bind.
    pub fn open(dir: &Path, service: &str) -> Self {
        let rendezvous = dir.join(service);
        let transport = match open_transport(&rendezvous) {
            Ok(t) => {
                info!("port lease service ready ({} transport)", t.name());
                Some(t)
            }
            Err(err) => {
                warn!("port lease service unavailable: {}", err);
                None
            }
        };
        Self {
            rendezvous,
            transport: Mutex::new(transport),
        }
    }

    /// One bound-socket request against the pinned transport, re-probing
    /// once if it fails mid-session.
    pub async fn acquire(&self, addr: SocketAddr) -> Result<OwnedFd, RpaError> {
        let mut guard = self.transport.lock().await;
        let transport = match guard.take() {
            Some(t) => t,
            None => open_transport(&self.rendezvous)?,
        };
        match Self::call(transport, addr).await {
            (returned, Ok(fd)) => {
                *guard = returned;
                Ok(fd)
            }
            (_, Err(err)) => {
                warn!("port lease request failed ({}), reopening transport", err);
                let fresh = open_transport(&self.rendezvous)?;
                match Self::call(fresh, addr).await {
                    (returned, Ok(fd)) => {
                        *guard = returned;
                        Ok(fd)
                    }
                    (_, Err(err)) => Err(err),
                }
            }
        }
    }

    /// The transport does blocking I/O, so the round trip runs off the
    /// async threads; the transport comes back for reuse on success.
    async fn call(
        transport: Box<dyn LeaseTransport>,
        addr: SocketAddr,
    ) -> (Option<Box<dyn LeaseTransport>>, Result<OwnedFd, RpaError>) {
        let outcome = tokio::task::spawn_blocking(move || {
            let mut transport = transport;
            let result = transport.acquire(&addr);
            (transport, result)
        })
        .await;
        match outcome {
            Ok((transport, result)) => (Some(transport), result),
            Err(join_err) => (
                None,
                Err(RpaError::Io(io::Error::new(io::ErrorKind::Other, join_err))),
            ),
        }
    }
}

/// Turn a leased bound descriptor into a connectable tokio socket.
pub fn lease_to_socket(fd: OwnedFd) -> io::Result<tokio::net::TcpSocket> {
    let stream = std::net::TcpStream::from(fd);
    stream.set_nonblocking(true)?;
    Ok(tokio::net::TcpSocket::from_std_stream(stream))
}
