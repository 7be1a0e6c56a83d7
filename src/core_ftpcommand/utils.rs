//! Helpers shared by the path-taking command handlers.

use std::path::PathBuf;

use crate::core_path::{path_mk, path_v2r};
use crate::session::Session;

/// Merge a command argument with the working directory and map it onto the
/// filesystem. `None` for the real path means the virtual path cannot be
/// resolved (unknown `~user`), which handlers report as a parameter error.
pub fn resolve(session: &Session, arg: &str) -> (String, Option<PathBuf>) {
    let vpath = path_mk(&session.cwd, arg);
    let rpath = path_v2r(&vpath, &session.config.server);
    (vpath, rpath)
}

/// The standard `550 <vpath>: <reason>.` failure line.
pub fn fail_line(vpath: &str, err: &std::io::Error) -> String {
    format!("550 {}: {}.", vpath, err)
}
