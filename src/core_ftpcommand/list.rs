//! LIST and NLST: the listing itself streams over the data connection in
//! ASCII representation, formatted by `core_ftplist`.

use std::io;
use std::path::PathBuf;

use tokio::net::TcpStream;

use crate::core_ftplist::{parse_flags, send_listing, split_pattern, ListFlags};
use crate::core_ftpcommand::utils::fail_line;
use crate::core_ftpcommand::CmdOutcome;
use crate::core_network::ftpdata::TransferBody;
use crate::core_path::{path_mk, path_v2r};
use crate::core_stream::fdbuf::FdWriter;
use crate::session::Session;

pub async fn handle_list(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    let defaults = ListFlags {
        long: true,
        ..ListFlags::default()
    };
    listing(session, arg, defaults).await
}

pub async fn handle_nlst(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    listing(session, arg, ListFlags::default()).await
}

async fn listing(session: &mut Session, arg: &str, defaults: ListFlags) -> io::Result<CmdOutcome> {
    let (mut flags, rest) = match parse_flags(arg, defaults) {
        Some(parsed) => parsed,
        None => return Ok(CmdOutcome::SyntaxError),
    };

    let vpath = path_mk(&session.cwd, rest);
    let (dir_vpath, mut pattern) = split_pattern(&vpath);
    let dir_vpath = if dir_vpath.is_empty() {
        String::from("/")
    } else {
        dir_vpath
    };
    let mut rpath = match path_v2r(&dir_vpath, &session.config.server) {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };

    let mut skip_dotdot = dir_vpath == "/";
    if pattern.is_none() {
        match tokio::fs::metadata(&rpath).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                // A single file: list it by name out of its parent.
                let leaf = rpath
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                rpath = rpath.parent().map(PathBuf::from).unwrap_or(rpath);
                pattern = Some(leaf);
                flags.all = true;
                skip_dotdot = false;
            }
            Err(err) => {
                session.reply(&fail_line(&vpath, &err)).await?;
                return Ok(CmdOutcome::Quiet);
            }
        }
    }
    flags.skip_dotdot = skip_dotdot;

    let body: TransferBody = Box::new(move |stream: TcpStream| {
        Box::pin(async move {
            let (_r, write_half) = stream.into_split();
            let mut writer = FdWriter::new(write_half, true, false);
            send_listing(&mut writer, &rpath, flags, pattern.as_deref()).await?;
            writer.shutdown().await?;
            Ok(0)
        })
    });
    session.start_transfer(&vpath, true, true, false, body).await?;
    Ok(CmdOutcome::Quiet)
}
