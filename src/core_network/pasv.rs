//! PASV and EPSV: bind a one-shot listener next to the control connection's
//! local address and tell the client where to find it.

use std::io;
use std::net::IpAddr;

use tokio::net::TcpListener;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_pasv(session: &mut Session, _arg: &str) -> io::Result<CmdOutcome> {
    session.pasv_listener = None;
    let v4 = match session.local.ip() {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => {
            session.reply("425 Can't open passive connection.").await?;
            return Ok(CmdOutcome::Quiet);
        }
    };
    let listener = match TcpListener::bind((v4, 0)).await {
        Ok(listener) => listener,
        Err(_) => {
            session
                .reply("425 Can't open passive connection (bind failed).")
                .await?;
            return Ok(CmdOutcome::Quiet);
        }
    };
    let port = listener.local_addr()?.port();
    let o = v4.octets();
    session.port_addr = None;
    session.pasv_listener = Some(listener);
    session
        .reply(&format!(
            "227 Entering passive mode ({},{},{},{},{},{})",
            o[0],
            o[1],
            o[2],
            o[3],
            port >> 8,
            port & 0xff
        ))
        .await?;
    Ok(CmdOutcome::Quiet)
}

pub async fn handle_epsv(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if arg.eq_ignore_ascii_case("ALL") {
        session.epsv_all = true;
        return Ok(CmdOutcome::Success);
    }
    if !arg.is_empty() {
        let wanted = match arg {
            "1" => session.local.is_ipv4(),
            "2" => session.local.is_ipv6(),
            _ => false,
        };
        if !wanted {
            session
                .reply("522 Network protocol not supported, use (1,2)")
                .await?;
            return Ok(CmdOutcome::Quiet);
        }
    }

    session.pasv_listener = None;
    let listener = match TcpListener::bind((session.local.ip(), 0)).await {
        Ok(listener) => listener,
        Err(_) => {
            session
                .reply("425 Can't open passive connection (bind failed).")
                .await?;
            return Ok(CmdOutcome::Quiet);
        }
    };
    let port = listener.local_addr()?.port();
    session.port_addr = None;
    session.pasv_listener = Some(listener);
    session
        .reply(&format!("229 Entering Extended Passive Mode (|||{}|)", port))
        .await?;
    Ok(CmdOutcome::Quiet)
}
