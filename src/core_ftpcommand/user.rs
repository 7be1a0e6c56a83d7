//! USER: only the anonymous account exists. Other names are refused on the
//! spot, and the stored name makes a following PASS fail the same way.

use std::io;

use crate::core_ftpcommand::CmdOutcome;
use crate::session::{LoginState, Session};

pub async fn handle_user(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if arg.is_empty() {
        return Ok(CmdOutcome::SyntaxError);
    }

    // A fresh USER always restarts the login exchange.
    session.state = LoginState::NotLoggedIn;
    session.anonymous = false;
    session.ident = String::from("*");

    let name = arg.to_ascii_lowercase();
    if name == "anonymous" || name == "ftp" {
        session.username = Some(name);
        session.anonymous = true;
        session.state = LoginState::PasswordPending;
        session
            .reply("331 Guest login ok; use your e-mail address as password.")
            .await?;
    } else {
        session.username = Some(arg.to_string());
        return Ok(CmdOutcome::LoginIncorrect);
    }
    Ok(CmdOutcome::Quiet)
}
