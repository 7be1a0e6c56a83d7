use std::io;

use crate::constants::COMMENTS_TO;
use crate::core_ftpcommand::ftpcommand::HELP_NAMES;
use crate::core_ftpcommand::CmdOutcome;
use crate::session::Session;

pub async fn handle_help(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if !arg.is_empty() {
        session
            .reply(&format!(
                "214 No help available for command {}.",
                arg.to_ascii_uppercase()
            ))
            .await?;
        return Ok(CmdOutcome::Quiet);
    }

    let mut writer = session.writer.lock().await;
    writer
        .write_line("214-The following commands are recognized.")
        .await?;
    for row in HELP_NAMES.chunks(8) {
        let mut line = String::new();
        for name in row {
            line.push_str(&format!("{:>7}", name));
        }
        writer.write_line(&line).await?;
    }
    writer
        .write_line(&format!("214 Direct comments to {}.", COMMENTS_TO))
        .await?;
    Ok(CmdOutcome::Quiet)
}
