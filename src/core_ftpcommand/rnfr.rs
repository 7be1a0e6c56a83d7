use std::io;

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_rnfr(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
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

    match tokio::fs::symlink_metadata(&rpath).await {
        Ok(_) => {
            session.rename_from = Some(vpath);
            session
                .reply("350 File exists, ready for destination name")
                .await?;
        }
        Err(err) => {
            session.rename_from = None;
            session.reply(&fail_line(&vpath, &err)).await?;
        }
    }
    Ok(CmdOutcome::Quiet)
}
