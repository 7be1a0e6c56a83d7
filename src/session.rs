//! Per-client session: connection state, the control loop, and the glue
//! between command handlers and the data-connection worker.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify};

use crate::config::Config;
use crate::constants::{MAX_COMMAND_LINE, RPA_SERVICE};
use crate::core_ftpcommand::handlers::{self, Flow};
use crate::core_log::xferlog::{XferEntry, Xferlog};
use crate::core_network::ftpdata::{
    DataMode, DataTransfer, TransferBody, TransferEnv, TransferInfo, TransferRecord,
};
use crate::core_network::ServerCtx;
use crate::core_rpa::PortBroker;
use crate::core_stream::fdbuf::{FdReader, FdWriter};
use crate::core_stream::SharedWriter;
use crate::core_timeout::TimeoutScheduler;
use crate::helpers::{hostname, send_response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    NotLoggedIn,
    PasswordPending,
    Authenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

pub struct Session {
    pub config: Arc<Config>,
    pub writer: SharedWriter,
    pub peer: SocketAddr,
    pub local: SocketAddr,
    pub state: LoginState,
    pub username: Option<String>,
    pub anonymous: bool,
    /// Password offered at login; the transfer log's anonymous "ident".
    pub ident: String,
    pub type_: TransferType,
    pub cwd: String,
    pub umask: u32,
    pub errors: u32,
    pub rename_from: Option<String>,
    /// Validated PORT/EPRT target, consumed by the next transfer.
    pub port_addr: Option<SocketAddr>,
    /// Bound but not yet accepted PASV/EPSV listener.
    pub pasv_listener: Option<TcpListener>,
    pub epsv_all: bool,
    /// REST offset, applied to the next transfer only.
    pub rest_offset: u64,
    pub transfer: Option<DataTransfer>,
    pub scheduler: TimeoutScheduler,
    pub broker: Arc<PortBroker>,
    pub xferlog: Arc<Xferlog>,
    /// Set by `reply` when the line it wrote was 5xx-class; the dispatch
    /// layer folds it into the error counter.
    pub wrote_error: bool,
}

impl Session {
    fn new(ctx: &ServerCtx, writer: SharedWriter, peer: SocketAddr, local: SocketAddr) -> Self {
        Self {
            config: Arc::clone(&ctx.config),
            writer,
            peer,
            local,
            state: LoginState::NotLoggedIn,
            username: None,
            anonymous: false,
            ident: String::from("*"),
            type_: TransferType::Binary,
            cwd: String::from("/"),
            umask: ctx.config.umask_bits(),
            errors: 0,
            rename_from: None,
            port_addr: None,
            pasv_listener: None,
            epsv_all: false,
            rest_offset: 0,
            transfer: None,
            scheduler: ctx.scheduler.clone(),
            broker: Arc::clone(&ctx.broker),
            xferlog: Arc::clone(&ctx.xferlog),
            wrote_error: false,
        }
    }

    /// Write one reply line, noting 5xx-class results for the error counter.
    pub async fn reply(&mut self, line: &str) -> io::Result<()> {
        if line.starts_with('5') {
            self.wrote_error = true;
        }
        send_response(&self.writer, line).await
    }

    /// Reap a finished transfer worker: join it, log it, free the slot.
    /// Live workers are left alone.
    pub async fn reap_transfer(&mut self) {
        if self.transfer.as_ref().map_or(false, |t| t.is_finished()) {
            if let Some(transfer) = self.transfer.take() {
                if let Some(record) = transfer.join().await {
                    self.log_transfer(&record).await;
                }
            }
        }
    }

    /// Abort whatever transfer exists, live or finished, and reap it.
    /// Returns whether a worker was actually running.
    pub async fn abort_transfer(&mut self) -> bool {
        match self.transfer.take() {
            Some(transfer) => {
                let was_live = transfer.is_live();
                transfer.abort();
                if let Some(record) = transfer.join().await {
                    self.log_transfer(&record).await;
                }
                was_live
            }
            None => false,
        }
    }

    async fn log_transfer(&self, record: &TransferRecord) {
        if !(record.ok && record.log) {
            return;
        }
        let remote = self.peer.ip().to_string();
        self.xferlog
            .append(&XferEntry {
                seconds: record.seconds,
                remote_host: &remote,
                bytes: record.bytes,
                path: &record.vpath,
                ascii: record.ascii,
                outgoing: record.outgoing,
                anonymous: self.anonymous,
                ident: &self.ident,
            })
            .await;
    }

    /// Start a transfer worker for the pending PORT target or PASV listener.
    /// Writes the 150 preamble; every failure is reported here, so callers
    /// just return a quiet outcome.
    pub async fn start_transfer(
        &mut self,
        vpath: &str,
        ascii: bool,
        outgoing: bool,
        log: bool,
        body: TransferBody,
    ) -> io::Result<()> {
        self.reap_transfer().await;
        if self.transfer.as_ref().map_or(false, |t| t.is_live()) {
            // One data session per control session; no state is consumed.
            self.reply("425 Can not build data connection.").await?;
            return Ok(());
        }

        let mode = if let Some(listener) = self.pasv_listener.take() {
            DataMode::Passive { listener }
        } else if let Some(target) = self.port_addr.take() {
            DataMode::Active { target }
        } else {
            self.reply("425 Use PORT or PASV first.").await?;
            return Ok(());
        };

        self.reply(&format!(
            "150 Opening {} mode data connection for {}.",
            if ascii { "ASCII" } else { "BINARY" },
            vpath
        ))
        .await?;

        let env = TransferEnv {
            control: Arc::clone(&self.writer),
            peer_ip: self.peer.ip(),
            local_ip: self.local.ip(),
            source_port: self.config.server.ftp_data_port,
            broker: Arc::clone(&self.broker),
            scheduler: self.scheduler.clone(),
            pasv_timeout: self.config.pasv_timeout(),
        };
        let info = TransferInfo {
            vpath: vpath.to_string(),
            ascii,
            outgoing,
            log,
        };
        self.transfer = Some(DataTransfer::start(env, mode, info, body));
        Ok(())
    }

    /// Serve one accepted control connection to completion.
    pub async fn run(stream: TcpStream, ctx: ServerCtx) {
        let (peer, local) = match (stream.peer_addr(), stream.local_addr()) {
            (Ok(peer), Ok(local)) => (peer, local),
            _ => return,
        };
        let (read_half, write_half) = stream.into_split();
        let writer: SharedWriter = Arc::new(Mutex::new(FdWriter::new(write_half, true, true)));
        let mut reader = FdReader::control(read_half, Arc::clone(&writer));

        // Idle timeout: a polite notice, then the write side is closed and
        // the control loop woken so it can tear the session down.
        let hangup = Arc::new(Notify::new());
        let idle_timer = {
            let writer = Arc::clone(&writer);
            let hangup = Arc::clone(&hangup);
            ctx.scheduler.schedule(ctx.config.idle_timeout(), move || {
                let writer = Arc::clone(&writer);
                let hangup = Arc::clone(&hangup);
                tokio::spawn(async move {
                    let mut writer = writer.lock().await;
                    let _ = writer
                        .write_line("421 Service not available, closing control connection.")
                        .await;
                    let _ = writer.shutdown().await;
                    hangup.notify_one();
                });
            })
        };

        let greeting = format!(
            "220 {} FTP server (ferroftpd {}) ready.",
            hostname(),
            env!("CARGO_PKG_VERSION")
        );
        if send_response(&writer, &greeting).await.is_err() {
            ctx.scheduler.cancel(idle_timer);
            return;
        }

        let mut session = Session::new(&ctx, writer, peer, local);
        let table = handlers::command_table();

        loop {
            session.reap_transfer().await;

            let line = tokio::select! {
                line = reader.read_line(MAX_COMMAND_LINE) => line,
                _ = hangup.notified() => {
                    info!("{}: idle timeout, closing session", peer);
                    break;
                }
            };
            ctx.scheduler.reset(idle_timer, ctx.config.idle_timeout());

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    if session.reply("500 Command line too long").await.is_err() {
                        break;
                    }
                    session.errors += 1;
                    match handlers::check_error_cap(&mut session).await {
                        Ok(false) => continue,
                        _ => break,
                    }
                }
                Err(err) => {
                    debug!("{}: control read failed: {}", peer, err);
                    break;
                }
            };

            match handlers::dispatch(&mut session, &table, &line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => {
                    debug!("{}: control write failed: {}", peer, err);
                    break;
                }
            }
        }

        ctx.scheduler.cancel(idle_timer);
        session.abort_transfer().await;
        info!("{}: session closed", peer);
    }
}

/// A broker for servers that never do active transfers from a privileged
/// source port; tests use this to avoid touching the rendezvous directory.
pub fn null_broker() -> Arc<PortBroker> {
    Arc::new(PortBroker::open(
        std::path::Path::new("/nonexistent"),
        RPA_SERVICE,
    ))
}
