/// The verbs this server dispatches. Historic X-aliases (XCWD, XPWD, ...)
/// parse to the same variant as their modern spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FtpCommand {
    User,
    Pass,
    Quit,
    Port,
    Eprt,
    Pasv,
    Epsv,
    Type,
    Stru,
    Mode,
    Cwd,
    Cdup,
    Pwd,
    Syst,
    Size,
    List,
    Nlst,
    Retr,
    Stor,
    Appe,
    Dele,
    Mkd,
    Rmd,
    Mdtm,
    Rnfr,
    Rnto,
    Rest,
    Abor,
    Stat,
    Site,
    Help,
    Noop,
}

/// Every spelling HELP advertises, alphabetically.
pub const HELP_NAMES: [&str; 37] = [
    "ABOR", "APPE", "CDUP", "CWD", "DELE", "EPRT", "EPSV", "HELP", "LIST", "MDTM", "MKD", "MODE",
    "NLST", "NOOP", "PASS", "PASV", "PORT", "PWD", "QUIT", "REST", "RETR", "RMD", "RNFR", "RNTO",
    "SITE", "SIZE", "STAT", "STOR", "STRU", "SYST", "TYPE", "USER", "XCUP", "XCWD", "XMKD",
    "XPWD", "XRMD",
];

impl FtpCommand {
    pub fn parse(verb: &str) -> Option<Self> {
        use FtpCommand::*;
        Some(match verb.to_ascii_uppercase().as_str() {
            "USER" => User,
            "PASS" => Pass,
            "QUIT" => Quit,
            "PORT" => Port,
            "EPRT" => Eprt,
            "PASV" => Pasv,
            "EPSV" => Epsv,
            "TYPE" => Type,
            "STRU" => Stru,
            "MODE" => Mode,
            "CWD" | "XCWD" => Cwd,
            "CDUP" | "XCUP" => Cdup,
            "PWD" | "XPWD" => Pwd,
            "SYST" => Syst,
            "SIZE" => Size,
            "LIST" => List,
            "NLST" => Nlst,
            "RETR" => Retr,
            "STOR" => Stor,
            "APPE" => Appe,
            "DELE" => Dele,
            "MKD" | "XMKD" => Mkd,
            "RMD" | "XRMD" => Rmd,
            "MDTM" => Mdtm,
            "RNFR" => Rnfr,
            "RNTO" => Rnto,
            "REST" => Rest,
            "ABOR" => Abor,
            "STAT" => Stat,
            "SITE" => Site,
            "HELP" => Help,
            "NOOP" => Noop,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use FtpCommand::*;
        match self {
            User => "USER",
            Pass => "PASS",
            Quit => "QUIT",
            Port => "PORT",
            Eprt => "EPRT",
            Pasv => "PASV",
            Epsv => "EPSV",
            Type => "TYPE",
            Stru => "STRU",
            Mode => "MODE",
            Cwd => "CWD",
            Cdup => "CDUP",
            Pwd => "PWD",
            Syst => "SYST",
            Size => "SIZE",
            List => "LIST",
            Nlst => "NLST",
            Retr => "RETR",
            Stor => "STOR",
            Appe => "APPE",
            Dele => "DELE",
            Mkd => "MKD",
            Rmd => "RMD",
            Mdtm => "MDTM",
            Rnfr => "RNFR",
            Rnto => "RNTO",
            Rest => "REST",
            Abor => "ABOR",
            Stat => "STAT",
            Site => "SITE",
            Help => "HELP",
            Noop => "NOOP",
        }
    }
}

/// Symbolic handler outcome; the dispatch layer turns it into a reply line.
#[derive(Debug, PartialEq, Eq)]
pub enum CmdOutcome {
    /// `200 <VERB> command successful.`
    Success,
    /// `250 Command successful.`
    FileActionOk,
    /// `230 Login OK.`
    LoggedIn,
    /// `501 Syntax error in parameters.`
    SyntaxError,
    /// `502 Command not implemented.`
    NotImplemented,
    /// `553 Permission denied.`
    Denied,
    /// `530 Login incorrect.`
    LoginIncorrect,
    /// `503 Bad sequence of commands.`
    BadSequence,
    /// The handler already wrote its reply.
    Quiet,
    /// `221 Goodbye.` and end of session.
    Quit,
}
