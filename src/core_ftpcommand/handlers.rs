//! The command table and dispatch layer.
//!
//! Each verb maps to a handler plus the session state it requires; a verb in
//! the wrong state is answered with the matching diagnostic without the
//! handler ever running. Handlers return a symbolic [`CmdOutcome`] and a
//! single formatting step turns that into the wire reply. Every 5xx-class
//! line, wherever it was written, feeds the per-session error counter.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::pin::Pin;

use crate::core_ftpcommand::ftpcommand::{CmdOutcome, FtpCommand};
use crate::core_ftpcommand::{
    abor, cwd, dele, help, list, mdtm, mkd, noop, pass, pwd, quit, rest, retr, rmd, rnfr, rnto,
    site, size, stat, stor, syst, type_, user,
};
use crate::core_network::{pasv, port};
use crate::session::{LoginState, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqState {
    Any,
    Authenticated,
}

pub type Handler = for<'a> fn(
    &'a mut Session,
    &'a str,
) -> Pin<Box<dyn Future<Output = io::Result<CmdOutcome>> + Send + 'a>>;

pub struct CommandEntry {
    pub required: ReqState,
    pub handler: Handler,
}

pub enum Flow {
    Continue,
    Quit,
}

macro_rules! entry {
    ($table:ident, $cmd:expr, $required:expr, $handler:path) => {
        $table.insert(
            $cmd,
            CommandEntry {
                required: $required,
                handler: |session, arg| Box::pin($handler(session, arg)),
            },
        );
    };
}

pub fn command_table() -> HashMap<FtpCommand, CommandEntry> {
    use FtpCommand::*;
    use ReqState::*;

    let mut table: HashMap<FtpCommand, CommandEntry> = HashMap::new();
    entry!(table, User, Any, user::handle_user);
    entry!(table, Pass, Any, pass::handle_pass);
    entry!(table, Quit, Any, quit::handle_quit);
    entry!(table, Help, Any, help::handle_help);
    entry!(table, Noop, Any, noop::handle_noop);
    entry!(table, Syst, Authenticated, syst::handle_syst);
    entry!(table, Port, Authenticated, port::handle_port);
    entry!(table, Eprt, Authenticated, port::handle_eprt);
    entry!(table, Pasv, Authenticated, pasv::handle_pasv);
    entry!(table, Epsv, Authenticated, pasv::handle_epsv);
    entry!(table, Type, Authenticated, type_::handle_type);
    entry!(table, Stru, Authenticated, type_::handle_stru);
    entry!(table, Mode, Authenticated, type_::handle_mode);
    entry!(table, Cwd, Authenticated, cwd::handle_cwd);
    entry!(table, Cdup, Authenticated, cwd::handle_cdup);
    entry!(table, Pwd, Authenticated, pwd::handle_pwd);
    entry!(table, Size, Authenticated, size::handle_size);
    entry!(table, Mdtm, Authenticated, mdtm::handle_mdtm);
    entry!(table, List, Authenticated, list::handle_list);
    entry!(table, Nlst, Authenticated, list::handle_nlst);
    entry!(table, Retr, Authenticated, retr::handle_retr);
    entry!(table, Stor, Authenticated, stor::handle_stor);
    entry!(table, Appe, Authenticated, stor::handle_appe);
    entry!(table, Dele, Authenticated, dele::handle_dele);
    entry!(table, Mkd, Authenticated, mkd::handle_mkd);
    entry!(table, Rmd, Authenticated, rmd::handle_rmd);
    entry!(table, Rnfr, Authenticated, rnfr::handle_rnfr);
    entry!(table, Rnto, Authenticated, rnto::handle_rnto);
    entry!(table, Rest, Authenticated, rest::handle_rest);
    entry!(table, Abor, Authenticated, abor::handle_abor);
    entry!(table, Stat, Authenticated, stat::handle_stat);
    entry!(table, Site, Authenticated, site::handle_site);
    table
}

/// Process one command line. `Flow::Quit` ends the session.
pub async fn dispatch(
    session: &mut Session,
    table: &HashMap<FtpCommand, CommandEntry>,
    line: &str,
) -> io::Result<Flow> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Flow::Continue);
    }
    let (verb, arg) = match line.find(' ') {
        Some(idx) => (&line[..idx], line[idx + 1..].trim()),
        None => (line, ""),
    };

    session.wrote_error = false;

    let cmd = match FtpCommand::parse(verb) {
        Some(cmd) => cmd,
        None => {
            session.reply("500 Command not understood").await?;
            return finish(session).await;
        }
    };

    let entry = match table.get(&cmd) {
        Some(entry) => entry,
        None => {
            session.reply("502 Command not implemented.").await?;
            return finish(session).await;
        }
    };

    if entry.required == ReqState::Authenticated && session.state != LoginState::Authenticated {
        let diagnostic = if session.state == LoginState::PasswordPending {
            "530 Not logged in - use the PASS command."
        } else {
            "530 Not logged in."
        };
        session.reply(diagnostic).await?;
        return finish(session).await;
    }

    let outcome = (entry.handler)(session, arg).await?;
    let reply = match outcome {
        CmdOutcome::Success => Some(format!("200 {} command successful.", cmd.name())),
        CmdOutcome::FileActionOk => Some(String::from("250 Command successful.")),
        CmdOutcome::LoggedIn => Some(String::from("230 Login OK.")),
        CmdOutcome::SyntaxError => Some(String::from("501 Syntax error in parameters.")),
        CmdOutcome::NotImplemented => Some(String::from("502 Command not implemented.")),
        CmdOutcome::Denied => Some(String::from("553 Permission denied.")),
        CmdOutcome::LoginIncorrect => Some(String::from("530 Login incorrect.")),
        CmdOutcome::BadSequence => Some(String::from("503 Bad sequence of commands.")),
        CmdOutcome::Quiet => None,
        CmdOutcome::Quit => {
            session.reply("221 Goodbye.").await?;
            return Ok(Flow::Quit);
        }
    };
    if let Some(reply) = reply {
        session.reply(&reply).await?;
    }
    finish(session).await
}

async fn finish(session: &mut Session) -> io::Result<Flow> {
    if session.wrote_error {
        session.errors += 1;
        if check_error_cap(session).await? {
            return Ok(Flow::Quit);
        }
    }
    Ok(Flow::Continue)
}

/// Enforce the max-errors cap; true means the session must end.
pub async fn check_error_cap(session: &mut Session) -> io::Result<bool> {
    if session.errors > session.config.server.max_errors {
        crate::helpers::send_response(&session.writer, "500 Too many errors").await?;
        return Ok(true);
    }
    Ok(false)
}
