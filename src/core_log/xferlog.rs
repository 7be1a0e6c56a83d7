//! Transfer log in the wu-ftpd `xferlog` format, one line per completed
//! transfer, appended by the session when it reaps the transfer worker.

use chrono::{DateTime, Local};
use log::error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One completed transfer, ready for the log.
pub struct XferEntry<'a> {
    pub seconds: u64,
    pub remote_host: &'a str,
    pub bytes: u64,
    pub path: &'a str,
    pub ascii: bool,
    pub outgoing: bool,
    pub anonymous: bool,
    /// Anonymous "ident": the password the client offered, `*` otherwise.
    pub ident: &'a str,
}

impl XferEntry<'_> {
    fn format(&self, now: DateTime<Local>) -> String {
        format!(
            "{} {} {} {} {} {} _ {} {} {} ftp 0 *\n",
            now.format("%a %b %d %H:%M:%S %Y"),
            self.seconds,
            self.remote_host,
            self.bytes,
            self.path,
            if self.ascii { 'a' } else { 'b' },
            if self.outgoing { 'o' } else { 'i' },
            if self.anonymous { 'a' } else { 'r' },
            self.ident,
        )
    }
}

pub struct Xferlog {
    path: String,
    file: Mutex<Option<File>>,
}

impl Xferlog {
    /// An empty path disables transfer logging entirely.
    pub async fn open(path: &str) -> Self {
        let log = Self {
            path: path.to_string(),
            file: Mutex::new(None),
        };
        if !log.path.is_empty() {
            log.reopen().await;
        }
        log
    }

    /// (Re)open the log file; the SIGHUP handler uses this to pick up a
    /// rotated file.
    pub async fn reopen(&self) {
        if self.path.is_empty() {
            return;
        }
        let mut guard = self.file.lock().await;
        let opened = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(&self.path)
            .await;
        match opened {
            Ok(file) => *guard = Some(file),
            Err(err) => {
                error!("xferlog: open {}: {}", self.path, err);
                *guard = None;
            }
        }
    }

    pub async fn append(&self, entry: &XferEntry<'_>) {
        let line = entry.format(Local::now());
        let mut guard = self.file.lock().await;
        if let Some(file) = guard.as_mut() {
            if let Err(err) = file.write_all(line.as_bytes()).await {
                error!("xferlog: write: {}", err);
                *guard = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn line_matches_the_wu_ftpd_shape() {
        let entry = XferEntry {
            seconds: 3,
            remote_host: "203.0.113.9",
            bytes: 4096,
            path: "/pub/file.bin",
            ascii: false,
            outgoing: true,
            anonymous: true,
            ident: "guest@example.org",
        };
        let when = Local.with_ymd_and_hms(2004, 7, 6, 12, 30, 45).unwrap();
        assert_eq!(
            entry.format(when),
            "Tue Jul 06 12:30:45 2004 3 203.0.113.9 4096 /pub/file.bin b _ o a guest@example.org ftp 0 *\n"
        );
    }

    #[test]
    fn stores_use_the_incoming_marker() {
        let entry = XferEntry {
            seconds: 1,
            remote_host: "198.51.100.4",
            bytes: 10,
            path: "/incoming/up.txt",
            ascii: true,
            outgoing: false,
            anonymous: false,
            ident: "*",
        };
        let when = Local.with_ymd_and_hms(2004, 7, 6, 0, 0, 1).unwrap();
        let line = entry.format(when);
        assert!(line.ends_with("/incoming/up.txt a _ i r * ftp 0 *\n"), "{line}");
    }

    #[tokio::test]
    async fn append_and_reopen_keep_appending() {
        let path = std::env::temp_dir().join(format!("xferlog-test-{}", std::process::id()));
        let path_str = path.to_str().unwrap();
        let _ = std::fs::remove_file(&path);

        let log = Xferlog::open(path_str).await;
        let entry = XferEntry {
            seconds: 2,
            remote_host: "127.0.0.1",
            bytes: 99,
            path: "/pub/a",
            ascii: false,
            outgoing: true,
            anonymous: true,
            ident: "x@y",
        };
        log.append(&entry).await;
        log.reopen().await;
        log.append(&entry).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn empty_path_disables_logging() {
        let log = Xferlog::open("").await;
        let entry = XferEntry {
            seconds: 0,
            remote_host: "127.0.0.1",
            bytes: 0,
            path: "/x",
            ascii: false,
            outgoing: true,
            anonymous: true,
            ident: "*",
        };
        // Must be a no-op rather than an error.
        log.append(&entry).await;
    }
}
