//! PASS: anything is a valid password for the guest account. Login delivers
//! the welcome banner and the root directory's message file as the body of
//! the 230 reply.

use std::io;
use std::path::Path;

use log::info;

use crate::core_ftpcommand::CmdOutcome;
use crate::core_path::path_v2r;
use crate::helpers::send_text_file;
use crate::session::{LoginState, Session};

pub async fn handle_pass(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    match &session.username {
        None => {
            session.reply("503 Please use the USER command first.").await?;
            Ok(CmdOutcome::Quiet)
        }
        Some(name) if session.anonymous && session.state == LoginState::PasswordPending => {
            info!("{}: guest login as {} ({})", session.peer, name, arg);
            session.state = LoginState::Authenticated;
            if !arg.is_empty() {
                session.ident = arg.to_string();
            }

            send_text_file(
                &session.writer,
                Path::new(&session.config.server.welcome_file),
                "230-",
            )
            .await?;
            if let Some(root) = path_v2r("/", &session.config.server) {
                let message = root.join(&session.config.server.message_file);
                send_text_file(&session.writer, &message, "230-").await?;
            }
            Ok(CmdOutcome::LoggedIn)
        }
        Some(name) => {
            info!("{}: login refused for {}", session.peer, name);
            session.username = None;
            session.state = LoginState::NotLoggedIn;
            Ok(CmdOutcome::LoginIncorrect)
        }
    }
}
