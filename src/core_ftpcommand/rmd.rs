use std::io;

use log::info;

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_rmd(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if !session.config.server.read_write {
        return Ok(CmdOutcome::NotImplemented);
    }
    if arg.is_empty() {
        return Ok(CmdOutcome::SyntaxError);
    }
    let (vpath, rpath) = resolve(session, arg);
    let rpath = match rpath {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };

    match tokio::fs::remove_dir(&rpath).await {
        Ok(()) => {
            info!("{}: removed directory {}", session.peer, vpath);
            Ok(CmdOutcome::FileActionOk)
        }
        Err(err) => {
            session.reply(&fail_line(&vpath, &err)).await?;
            Ok(CmdOutcome::Quiet)
        }
    }
}
