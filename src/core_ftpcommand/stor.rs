//! STOR and APPE: upload over the data connection. Inbound ASCII data is
//! stored with native line endings; REST offsets resume binary stores only.

use std::io;
use std::io::SeekFrom;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::core_ftpcommand::utils::{fail_line, resolve};
use crate::core_ftpcommand::CmdOutcome;
use crate::core_network::ftpdata::TransferBody;
use crate::core_stream::fdbuf::FdReader;
use crate::session::{Session, TransferType};

pub async fn handle_stor(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    store(session, arg, false).await
}

pub async fn handle_appe(session: &mut Session, arg: &str) -> io::Result<CmdOutcome> {
    store(session, arg, true).await
}

async fn store(session: &mut Session, arg: &str, append: bool) -> io::Result<CmdOutcome> {
    if !session.config.server.read_write {
        return Ok(CmdOutcome::NotImplemented);
    }
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

    let mut options = OpenOptions::new();
    options.write(true).create(true);
    if append {
        options.append(true);
    } else if offset == 0 {
        options.truncate(true);
    }
    options.mode(0o666 & !session.umask);

    let mut file = match options.open(&rpath).await {
        Ok(file) => file,
        Err(err) => {
            session.reply(&fail_line(&vpath, &err)).await?;
            return Ok(CmdOutcome::Quiet);
        }
    };
    if offset > 0 && !append {
        if let Err(err) = file.seek(SeekFrom::Start(offset)).await {
            session.reply(&fail_line(&vpath, &err)).await?;
            return Ok(CmdOutcome::Quiet);
        }
    }

    let body: TransferBody = Box::new(move |stream: TcpStream| {
        Box::pin(async move { receive_file(stream, file, ascii).await })
    });
    session.start_transfer(&vpath, ascii, false, true, body).await?;
    Ok(CmdOutcome::Quiet)
}

async fn receive_file(stream: TcpStream, mut file: File, ascii: bool) -> io::Result<u64> {
    let (read_half, _write_half) = stream.into_split();
    let mut total = 0u64;
    if ascii {
        let mut reader = FdReader::new(read_half, true);
        let mut chunk = Vec::with_capacity(crate::constants::STREAM_BUF_SIZE);
        while let Some(byte) = reader.read_byte().await? {
            chunk.push(byte);
            if chunk.len() == chunk.capacity() {
                file.write_all(&chunk).await?;
                total += chunk.len() as u64;
                chunk.clear();
            }
        }
        if !chunk.is_empty() {
            file.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
    } else {
        let mut read_half = read_half;
        total = tokio::io::copy(&mut read_half, &mut file).await?;
    }
    file.flush().await?;
    Ok(total)
}
