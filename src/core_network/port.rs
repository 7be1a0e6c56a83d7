//! PORT and EPRT: active-mode data connection targets. A target whose host
//! differs from the control peer is refused outright (FTP bounce).

use std::io;
use std::net::{IpAddr, SocketAddr};

use log::warn;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_port(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if session.epsv_all {
        return Ok(CmdOutcome::SyntaxError);
    }
    let target = match parse_port_arg(arg) {
        Some(target) => target,
        None => return Ok(CmdOutcome::SyntaxError),
    };
    accept_target(session, target).await
}

pub async fn handle_eprt(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if session.epsv_all {
        return Ok(CmdOutcome::SyntaxError);
    }
    match parse_eprt_arg(arg) {
        Ok(target) => accept_target(session, target).await,
        Err(EprtError::Protocol) => {
            session
                .reply("522 Network protocol not supported, use (1,2)")
                .await?;
            Ok(CmdOutcome::Quiet)
        }
        Err(EprtError::Syntax) => Ok(CmdOutcome::SyntaxError),
    }
}

async fn accept_target(session: &mut Session, target: SocketAddr) -> io::Result<CmdOutcome> {
    if target.ip() != session.peer.ip() || target.port() == 0 {
        warn!(
            "refused data connection target {} from {}",
            target, session.peer
        );
        session.port_addr = None;
        session
            .reply("504 PORT command not accepted for security reasons.")
            .await?;
        return Ok(CmdOutcome::Quiet);
    }
    session.port_addr = Some(target);
    session.pasv_listener = None;
    Ok(CmdOutcome::Success)
}

fn parse_port_arg(arg: &str) -> Option<SocketAddr> {
    let mut parts = arg.split(',');
    let mut octets = [0u8; 6];
    for slot in octets.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    let ip = IpAddr::from([octets[0], octets[1], octets[2], octets[3]]);
    let port = u16::from(octets[4]) << 8 | u16::from(octets[5]);
    Some(SocketAddr::new(ip, port))
}

enum EprtError {
    Syntax,
    Protocol,
}

fn parse_eprt_arg(arg: &str) -> Result<SocketAddr, EprtError> {
    // RFC 2428: <d><proto><d><addr><d><port><d> with any printable delimiter.
    let delim = arg.chars().next().ok_or(EprtError::Syntax)?;
    let mut fields = arg[delim.len_utf8()..].split(delim);
    let proto = fields.next().ok_or(EprtError::Syntax)?;
    let addr = fields.next().ok_or(EprtError::Syntax)?;
    let port = fields.next().ok_or(EprtError::Syntax)?;

    let ip: IpAddr = addr.parse().map_err(|_| EprtError::Syntax)?;
    match (proto, ip) {
        ("1", IpAddr::V4(_)) | ("2", IpAddr::V6(_)) => {}
        ("1", _) | ("2", _) => return Err(EprtError::Syntax),
        _ => return Err(EprtError::Protocol),
    }
    let port: u16 = port.parse().map_err(|_| EprtError::Syntax)?;
    if port == 0 {
        return Err(EprtError::Syntax);
    }
    Ok(SocketAddr::new(ip, port))
}
