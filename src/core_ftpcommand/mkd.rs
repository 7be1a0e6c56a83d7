use std::io;
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;

use log::info;

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_mkd(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
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

    if let Err(err) = tokio::fs::create_dir(&rpath).await {
        session.reply(&fail_line(&vpath, &err)).await?;
        return Ok(CmdOutcome::Quiet);
    }
    let mode = 0o777 & !session.umask;
    let _ = tokio::fs::set_permissions(&rpath, Permissions::from_mode(mode)).await;

    info!("{}: created directory {}", session.peer, vpath);
    session.reply(&format!("257 \"{}\" created.", vpath)).await?;
    Ok(CmdOutcome::Quiet)
}
