//! Small shared utilities: reply writing, multi-line file delivery, hostname.

use std::io;
use std::path::Path;

use crate::core_stream::SharedWriter;

/// Write one reply line on the control connection. The writer is
/// line-buffered, so the line reaches the socket before this returns.
pub async fn send_response(writer: &SharedWriter, line: &str) -> io::Result<()> {
    let mut writer = writer.lock().await;
    writer.write_line(line).await
}

/// Stream a text file as the body of a multi-line reply, each line carrying
/// the `NNN-` prefix. Missing or unreadable files are silently skipped; a
/// final unterminated line is completed.
pub async fn send_text_file(writer: &SharedWriter, path: &Path, prefix: &str) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Ok(()),
    }
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(_) => return Ok(()),
    };

    let mut writer = writer.lock().await;
    for line in text.lines() {
        writer.write(prefix.as_bytes()).await?;
        writer.write_line(line).await?;
    }
    Ok(())
}

/// This host's name for the greeting and STAT banner.
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| String::from("localhost"))
}
