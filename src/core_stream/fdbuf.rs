//! Buffered stream halves for the control and data connections.
//!
//! The read half owns its buffer and is used by exactly one task; the write
//! half is shared behind a lock so transfer workers and timeout callbacks can
//! reply on the control connection while the session task is blocked reading.
//! CRLF translation and the embedded telnet interpreter live here so command
//! handlers only ever see clean `\n`-terminated lines.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::constants::STREAM_BUF_SIZE;
use crate::core_stream::telnet::{TelnetAction, TelnetDecoder};

/// Control-connection write half, shared between the session task, the
/// transfer worker and timeout callbacks.
pub type SharedWriter = Arc<Mutex<FdWriter<OwnedWriteHalf>>>;

pub struct FdWriter<W> {
    inner: W,
    buf: Vec<u8>,
    crlf: bool,
    linebuf: bool,
}

impl<W: AsyncWrite + Unpin> FdWriter<W> {
    pub fn new(inner: W, crlf: bool, linebuf: bool) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(STREAM_BUF_SIZE),
            crlf,
            linebuf,
        }
    }

    /// Queue bytes, translating `\n` into `\r\n` when enabled. Line-buffered
    /// writers flush after every newline.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        for &b in data {
            if self.crlf && b == b'\n' {
                self.push(b'\r').await?;
            }
            self.push(b).await?;
            if self.linebuf && b == b'\n' {
                self.flush().await?;
            }
        }
        Ok(())
    }

    /// Write one reply line; the terminator is appended here.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write(line.as_bytes()).await?;
        self.write(b"\n").await
    }

    async fn push(&mut self, b: u8) -> io::Result<()> {
        if self.buf.len() >= STREAM_BUF_SIZE {
            self.flush_buf().await?;
        }
        self.buf.push(b);
        Ok(())
    }

    async fn flush_buf(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf).await?;
            self.buf.clear();
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.flush_buf().await?;
        self.inner.flush().await
    }

    /// Abort-output: drop everything that has not reached the socket yet.
    pub fn purge(&mut self) {
        self.buf.clear();
    }

    /// Flush pending output and send FIN.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.flush().await?;
        self.inner.shutdown().await
    }
}

enum ByteEvent {
    Byte(u8),
    Eof,
    Restart,
}

pub struct FdReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    pushback: Option<u8>,
    last_was_cr: bool,
    crlf: bool,
    decoder: Option<TelnetDecoder>,
    oob: Option<SharedWriter>,
}

impl<R: AsyncRead + Unpin> FdReader<R> {
    /// Reader for a data connection or file: newline translation only.
    pub fn new(inner: R, crlf: bool) -> Self {
        Self {
            inner,
            buf: vec![0; STREAM_BUF_SIZE],
            pos: 0,
            filled: 0,
            pushback: None,
            last_was_cr: false,
            crlf,
            decoder: None,
            oob: None,
        }
    }

    /// Reader for a control connection: CRLF translation plus the embedded
    /// telnet interpreter, which answers through `oob`.
    pub fn control(inner: R, oob: SharedWriter) -> Self {
        let mut reader = Self::new(inner, true);
        reader.decoder = Some(TelnetDecoder::new());
        reader.oob = Some(oob);
        reader
    }

    /// Push one byte back; the next read returns it first.
    pub fn unread(&mut self, byte: u8) {
        self.pushback = Some(byte);
    }

    async fn next_raw(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.pushback.take() {
            return Ok(Some(b));
        }
        if self.pos >= self.filled {
            // One read, however much the kernel has ready; never waits for
            // a full buffer.
            let n = self.inner.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
            self.pos = 0;
            self.filled = n;
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }

    async fn read_event(&mut self) -> io::Result<ByteEvent> {
        loop {
            let raw = match self.next_raw().await? {
                Some(b) => b,
                None => return Ok(ByteEvent::Eof),
            };

            let b = match self.decoder.as_mut() {
                Some(decoder) => match decoder.feed(raw) {
                    TelnetAction::Emit(b) => b,
                    TelnetAction::Continue => continue,
                    TelnetAction::Restart => return Ok(ByteEvent::Restart),
                    TelnetAction::Purge => {
                        if let Some(oob) = &self.oob {
                            oob.lock().await.purge();
                        }
                        continue;
                    }
                    TelnetAction::Reply { bytes, flush } => {
                        if let Some(oob) = &self.oob {
                            let mut writer = oob.lock().await;
                            writer.write(&bytes).await?;
                            if flush {
                                writer.flush().await?;
                            }
                        }
                        continue;
                    }
                },
                None => raw,
            };

            if self.crlf {
                if b == b'\n' && self.last_was_cr {
                    // Second half of a CRLF pair already reported.
                    self.last_was_cr = false;
                    continue;
                }
                self.last_was_cr = b == b'\r';
                if b == b'\r' {
                    return Ok(ByteEvent::Byte(b'\n'));
                }
            }
            return Ok(ByteEvent::Byte(b));
        }
    }

    /// One translated byte; `Ok(None)` is end of stream.
    pub async fn read_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.read_event().await? {
                ByteEvent::Byte(b) => return Ok(Some(b)),
                ByteEvent::Eof => return Ok(None),
                ByteEvent::Restart => continue,
            }
        }
    }

    /// One logical line without its terminator. A synchronize mark restarts
    /// accumulation; `Ok(None)` is end of stream with nothing buffered. A
    /// line longer than `max` is an error, not a truncation.
    pub async fn read_line(&mut self, max: usize) -> io::Result<Option<String>> {
        let mut line: Vec<u8> = Vec::new();
        loop {
            match self.read_event().await? {
                ByteEvent::Eof => {
                    if line.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
                ByteEvent::Restart => line.clear(),
                ByteEvent::Byte(b'\n') => {
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
                ByteEvent::Byte(b) => {
                    if line.len() + 1 >= max {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "command line too long",
                        ));
                    }
                    line.push(b);
                }
            }
        }
    }
}
