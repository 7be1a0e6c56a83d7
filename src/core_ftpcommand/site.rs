//! SITE: only UMASK (and HELP about it) survive in an anonymous-only server.

use std::io;

use crate::constants::COMMENTS_TO;
use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_site(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    let (sub, rest) = match arg.find(' ') {
        Some(idx) => (&arg[..idx], arg[idx + 1..].trim()),
        None => (arg, ""),
    };
    match sub.to_ascii_uppercase().as_str() {
        "HELP" => {
            let mut writer = session.writer.lock().await;
            writer
                .write_line("214-The following SITE commands are recognized.")
                .await?;
            writer.write_line("   UMASK").await?;
            writer
                .write_line(&format!("214 Direct comments to {}.", COMMENTS_TO))
                .await?;
            Ok(CmdOutcome::Quiet)
        }
        "UMASK" => umask(session, rest).await,
        "" => Ok(CmdOutcome::SyntaxError),
        _ => {
            session.reply("500 SITE command not understood").await?;
            Ok(CmdOutcome::Quiet)
        }
    }
}

async fn umask(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if arg.is_empty() {
        session
            .reply(&format!("200 Current UMASK is {:03o}.", session.umask))
            .await?;
        return Ok(CmdOutcome::Quiet);
    }
    if !session.config.server.read_write {
        return Ok(CmdOutcome::Denied);
    }
    let mask = match u32::from_str_radix(arg, 8) {
        Ok(mask) => mask & 0o777,
        Err(_) => return Ok(CmdOutcome::SyntaxError),
    };
    let old = session.umask;
    session.umask = mask;
    session
        .reply(&format!("200 UMASK set to {:03o} (was {:03o}).", mask, old))
        .await?;
    Ok(CmdOutcome::Quiet)
}
