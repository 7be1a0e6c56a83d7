//! STAT: session status on the control connection, or an inline directory
//! listing when given a path.

use std::io;
use std::path::PathBuf;

use crate::core_ftplist::{send_listing, split_pattern, ListFlags};
use crate::core_ftpcommand::utils::resolve;
use crate::core_ftpcommand::CmdOutcome;
use crate::helpers::hostname;
use crate::session::{Session, TransferType};

pub async fn handle_stat(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if arg.is_empty() {
        return status(session).await;
    }

    let (vpath, _) = resolve(session, arg);
    let (dir_vpath, mut pattern) = split_pattern(&vpath);
    let dir_vpath = if dir_vpath.is_empty() {
        String::from("/")
    } else {
        dir_vpath
    };
    let mut rpath = match crate::core_path::path_v2r(&dir_vpath, &session.config.server) {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };

    let mut flags = ListFlags {
        long: true,
        skip_dotdot: dir_vpath == "/",
        ..ListFlags::default()
    };
    if pattern.is_none() {
        if let Ok(meta) = tokio::fs::metadata(&rpath).await {
            if !meta.is_dir() {
                // A single file: list it by name out of its parent.
                let leaf = rpath
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                rpath = rpath.parent().map(PathBuf::from).unwrap_or(rpath);
                pattern = Some(leaf);
                flags.all = true;
                flags.skip_dotdot = false;
            }
        }
    }
    let mut writer = session.writer.lock().await;
    writer
        .write_line(&format!("213-Status of {}:", vpath))
        .await?;
    if let Err(err) = send_listing(&mut *writer, &rpath, flags, pattern.as_deref()).await {
        writer.write_line(&format!("213-{}: {}.", vpath, err)).await?;
    }
    writer.write_line("213 End of status.").await?;
    Ok(CmdOutcome::Quiet)
}

async fn status(session: &mut Session) -> io::Result<CmdOutcome> {
    let login = match &session.username {
        Some(_) if session.anonymous => String::from("    Logged in anonymously"),
        Some(user) => format!("    Logged in as {}", user),
        None => String::from("    Not logged in"),
    };
    let type_line = match session.type_ {
        TransferType::Binary => "    TYPE: Image; STRUcture: File; transfer MODE: Stream",
        TransferType::Ascii => {
            "    TYPE: ASCII, FORM: Nonprint; STRUcture: File; transfer MODE: Stream"
        }
    };
    let data_line = if session.transfer.as_ref().map_or(false, |t| t.is_live()) {
        "    Data transfer in progress"
    } else {
        "    No data connection"
    };

    let mut writer = session.writer.lock().await;
    writer
        .write_line(&format!("211-{} FTP server status:", hostname()))
        .await?;
    writer
        .write_line(&format!("    ferroftpd {}", env!("CARGO_PKG_VERSION")))
        .await?;
    writer.write_line(&login).await?;
    writer.write_line(type_line).await?;
    writer.write_line(data_line).await?;
    writer.write_line("211 End of status.").await?;
    Ok(CmdOutcome::Quiet)
}
