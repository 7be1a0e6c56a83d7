//! REST: record a byte offset for the next transfer. Nothing else happens
//! until a RETR or STOR consumes it.

use std::io;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_rest(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    // Strict unsigned decimal; anything else is a parameter error.
    let offset: u64 = match arg.parse() {
        Ok(offset) => offset,
        Err(_) => return Ok(CmdOutcome::SyntaxError),
    };
    session.rest_offset = offset;
    session
        .reply(&format!(
            "350 RESTarting at {}, continue with transfer command",
            offset
        ))
        .await?;
    Ok(CmdOutcome::Quiet)
}
