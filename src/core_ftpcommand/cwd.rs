//! CWD and CDUP. A successful change also delivers the new directory's
//! message file as the body of the 250 reply.

use std::io;

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::helpers::send_text_file;
use crate::session::Session;

pub async fn handle_cwd(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    let (vpath, rpath) = resolve(session, arg);
    let rpath = match rpath {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };

    match tokio::fs::metadata(&rpath).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            session
                .reply(&format!("550 {}: Not a directory.", vpath))
                .await?;
            return Ok(CmdOutcome::Quiet);
        }
        Err(err) => {
            session.reply(&fail_line(&vpath, &err)).await?;
            return Ok(CmdOutcome::Quiet);
        }
    }

    session.cwd = vpath;
    let message = rpath.join(&session.config.server.message_file);
    send_text_file(&session.writer, &message, "250-").await?;
    Ok(CmdOutcome::FileActionOk)
}

pub async fn handle_cdup(session: &mut Session, _arg: &str) -> io::Result<CmdOutcome> {
    handle_cwd(session, "..").await
}
