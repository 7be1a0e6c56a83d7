// One module per verb family, plus the table that binds them together.
pub mod abor;
pub mod cwd;
pub mod dele;
pub mod ftpcommand;
pub mod handlers;
pub mod help;
pub mod list;
pub mod mdtm;
pub mod mkd;
pub mod noop;
pub mod pass;
pub mod pwd;
pub mod quit;
pub mod rest;
pub mod retr;
pub mod rmd;
pub mod rnfr;
pub mod rnto;
pub mod site;
pub mod size;
pub mod stat;
pub mod stor;
pub mod syst;
pub mod type_;
pub mod user;
pub mod utils;

pub use ftpcommand::{CmdOutcome, FtpCommand};
