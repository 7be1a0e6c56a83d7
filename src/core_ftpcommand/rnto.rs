use std::io;

use log::info;

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::core_path::path_v2r;
use crate::session::Session;

pub async fn handle_rnto(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if !session.config.server.read_write {
        return Ok(CmdOutcome::NotImplemented);
    }
    // The source name only carries to the immediately following command.
    let from_vpath = match session.rename_from.take() {
        Some(from) => from,
        None => return Ok(CmdOutcome::BadSequence),
    };
    if arg.is_empty() {
        return Ok(CmdOutcome::SyntaxError);
    }

    let from_rpath = match path_v2r(&from_vpath, &session.config.server) {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };
    let (to_vpath, to_rpath) = resolve(session, arg);
    let to_rpath = match to_rpath {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };

    match tokio::fs::rename(&from_rpath, &to_rpath).await {
        Ok(()) => {
            info!("{}: renamed {} to {}", session.peer, from_vpath, to_vpath);
            Ok(CmdOutcome::FileActionOk)
        }
        Err(err) => {
            session.reply(&fail_line(&to_vpath, &err)).await?;
            Ok(CmdOutcome::Quiet)
        }
    }
}
