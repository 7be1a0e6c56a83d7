use std::io;

use chrono::{DateTime, Local};

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_mdtm(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if arg.is_empty() {
        return Ok(CmdOutcome::SyntaxError);
    }
    let (vpath, rpath) = resolve(session, arg);
    let rpath = match rpath {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };

    match tokio::fs::metadata(&rpath).await.and_then(|m| m.modified()) {
        Ok(mtime) => {
            let stamp: DateTime<Local> = mtime.into();
            session
                .reply(&format!("213 {}", stamp.format("%Y%m%d%H%M%S")))
                .await?;
        }
        Err(err) => session.reply(&fail_line(&vpath, &err)).await?,
    }
    Ok(CmdOutcome::Quiet)
}
