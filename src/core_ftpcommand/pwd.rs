use std::io;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_pwd(session: &mut Session, _arg: &str) -> io::Result<CmdOutcome> {
    let line = format!("257 \"{}\" is the current directory.", session.cwd);
    session.reply(&line).await?;
    Ok(CmdOutcome::Quiet)
}
