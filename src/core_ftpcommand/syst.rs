use std::io;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_syst(session: &mut Session, _arg: &str) -> io::Result<CmdOutcome> {
    session.reply("215 UNIX Type: L8").await?;
    Ok(CmdOutcome::Quiet)
}
