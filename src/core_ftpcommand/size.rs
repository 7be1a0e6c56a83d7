//! SIZE: in binary type the file's byte size; in ASCII type the logical
//! size on the wire, where every newline costs two bytes.

use std::io;

use tokio::io::AsyncReadExt;

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::session::{Session, TransferType};

pub async fn handle_size(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if arg.is_empty() {
        return Ok(CmdOutcome::SyntaxError);
    }
    let (vpath, rpath) = resolve(session, arg);
    let rpath = match rpath {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };

    let meta = match tokio::fs::metadata(&rpath).await {
        Ok(meta) => meta,
        Err(err) => {
            session.reply(&fail_line(&vpath, &err)).await?;
            return Ok(CmdOutcome::Quiet);
        }
    };
    if !meta.is_file() {
        session.reply(&format!("550 {}: Not a file.", vpath)).await?;
        return Ok(CmdOutcome::Quiet);
    }

    let size = match session.type_ {
        TransferType::Binary => meta.len(),
        TransferType::Ascii => match ascii_size(&rpath).await {
            Ok(size) => size,
            Err(err) => {
                session.reply(&fail_line(&vpath, &err)).await?;
                return Ok(CmdOutcome::Quiet);
            }
        },
    };
    session.reply(&format!("213 {}", size)).await?;
    Ok(CmdOutcome::Quiet)
}

/// Size after CRLF expansion: bytes plus one per newline.
async fn ascii_size(rpath: &std::path::Path) -> io::Result<u64> {
    let mut file = tokio::fs::File::open(rpath).await?;
    let mut buf = vec![0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(size);
        }
        size += n as u64;
        size += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
    }
}
