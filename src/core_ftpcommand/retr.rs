//! RETR: download a file over the data connection, with CRLF expansion in
//! ASCII type and REST offsets in binary type.

use std::io;
use std::io::SeekFrom;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::core_network::ftpdata::TransferBody;
use crate::core_stream::fdbuf::FdWriter;
use crate::session::{Session, TransferType};

pub async fn handle_retr(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    if arg.is_empty() {
        return Ok(CmdOutcome::SyntaxError);
    }
    let (vpath, rpath) = resolve(session, arg);
    let rpath = match rpath {
        Some(rpath) => rpath,
        None => return Ok(CmdOutcome::SyntaxError),
    };
    let ascii = session.type_ == TransferType::Ascii;
    let offset = std::mem::take(&mut session.rest_offset);
    if ascii && offset > 0 {
        session
            .reply("504 RESTart not implemented for type A.")
            .await?;
        return Ok(CmdOutcome::Quiet);
    }

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
    let mut file = match File::open(&rpath).await {
        Ok(file) => file,
        Err(err) => {
            session.reply(&fail_line(&vpath, &err)).await?;
            return Ok(CmdOutcome::Quiet);
        }
    };
    if offset > 0 {
        if let Err(err) = file.seek(SeekFrom::Start(offset)).await {
            session.reply(&fail_line(&vpath, &err)).await?;
            return Ok(CmdOutcome::Quiet);
        }
    }

    let body: TransferBody = Box::new(move |stream: TcpStream| {
        Box::pin(async move { send_file(stream, file, ascii).await })
    });
    session.start_transfer(&vpath, ascii, true, true, body).await?;
    Ok(CmdOutcome::Quiet)
}

async fn send_file(stream: TcpStream, mut file: File, ascii: bool) -> io::Result<u64> {
    let (_read_half, write_half) = stream.into_split();
    let mut total = 0u64;
    if ascii {
        let mut writer = FdWriter::new(write_half, true, false);
        let mut buf = vec![0u8; crate::constants::STREAM_BUF_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write(&buf[..n]).await?;
            total += n as u64;
        }
        writer.shutdown().await?;
    } else {
        let mut write_half = write_half;
        total = tokio::io::copy(&mut file, &mut write_half).await?;
        write_half.shutdown().await?;
    }
    Ok(total)
}
