use std::io;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_quit(_session: &mut Session, _arg: &str) -> io::Result<CmdOutcome> {
    Ok(CmdOutcome::Quit)
}
