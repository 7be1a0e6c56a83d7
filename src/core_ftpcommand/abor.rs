//! ABOR: stop whatever transfer is running. The worker writes its own 426
//! before this handler's 226, because the abort joins the worker first.

use std::io;

use log::info;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_abor(session: &mut Session, _arg: &str) -> io::Result<CmdOutcome> {
    if session.abort_transfer().await {
        info!("{}: transfer aborted by client", session.peer);
    }
    session.reply("226 Abort successful.").await?;
    Ok(CmdOutcome::Quiet)
}
