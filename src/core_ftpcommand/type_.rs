//! TYPE, STRU and MODE: only the combinations every client actually uses are
//! accepted (A/I, file structure, stream mode).

use std::io;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::{Session, TransferType};

pub async fn handle_type(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    // "A N" and "I" style arguments; only the first word selects the type.
    let selector = arg.split_whitespace().next().unwrap_or("");
    match selector.to_ascii_uppercase().as_str() {
        "A" => {
            session.type_ = TransferType::Ascii;
            session.reply("200 Type set to A.").await?;
        }
        "I" => {
            session.type_ = TransferType::Binary;
            session.reply("200 Type set to I.").await?;
        }
        "" => return Ok(CmdOutcome::SyntaxError),
        other => {
            session
                .reply(&format!("504 Type {} not supported.", other))
                .await?;
        }
    }
    Ok(CmdOutcome::Quiet)
}

pub async fn handle_stru(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    match arg.to_ascii_uppercase().as_str() {
        "F" => session.reply("200 STRU F ok.").await?,
        "" => return Ok(CmdOutcome::SyntaxError),
        _ => session.reply("504 Unimplemented STRU type.").await?,
    }
    Ok(CmdOutcome::Quiet)
}

pub async fn handle_mode(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    match arg.to_ascii_uppercase().as_str() {
        "S" => session.reply("200 MODE S ok.").await?,
        "" => return Ok(CmdOutcome::SyntaxError),
        _ => session.reply("504 Unimplemented MODE type.").await?,
    }
    Ok(CmdOutcome::Quiet)
}
