//! Directory listing formatter for LIST and NLST.
//!
//! Rows go out through the data connection's [`FdWriter`] with CRLF
//! translation enabled, so everything here emits plain `\n`. Owner and group
//! columns always read `ftp`; real uids mean nothing to an anonymous client.

use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use chrono::{DateTime, Local};
use log::warn;
use nix::libc;
use tokio::fs;
use tokio::io::AsyncWrite;

use crate::core_stream::fdbuf::FdWriter;

/// Files older than this show their year instead of a time of day.
const RECENT_SECONDS: i64 = 15_552_000;

/// Options parsed from the dash-words of a LIST or NLST argument.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFlags {
    pub long: bool,
    pub all: bool,
    pub type_suffix: bool,
    pub skip_dotdot: bool,
}

/// Strip leading `-xyz` option words off a listing argument and fold them
/// into `flags`. Unknown option characters are ignored; `-R` is refused
/// (`None`) because recursive listings are not served.
pub fn parse_flags(arg: &str, mut flags: ListFlags) -> Option<(ListFlags, &str)> {
    let mut rest = arg;
    while let Some(word) = rest.strip_prefix('-') {
        let end = word.find([' ', '\t']).unwrap_or(word.len());
        for c in word[..end].chars() {
            match c {
                'F' => flags.type_suffix = true,
                'a' => flags.all = true,
                'l' => flags.long = true,
                'R' => return None,
                _ => {}
            }
        }
        rest = word[end..].trim_start_matches([' ', '\t']);
    }
    Some((flags, rest))
}

/// Split a trailing wildcard component off a virtual path. `/pub/*.txt`
/// becomes `("/pub", Some("*.txt"))`; a pattern directly under the root
/// leaves an empty directory part, which maps back onto the root.
pub fn split_pattern(vpath: &str) -> (String, Option<String>) {
    match vpath.rfind('/') {
        Some(idx) => {
            let leaf = &vpath[idx + 1..];
            if leaf.contains(['*', '?', '\\']) {
                (vpath[..idx].to_string(), Some(leaf.to_string()))
            } else {
                (vpath.to_string(), None)
            }
        }
        None => (vpath.to_string(), None),
    }
}

/// Shell-style wildcard match: `*` spans any run, `?` any single byte, and
/// a backslash escapes the following pattern byte.
pub fn wildcard_match(name: &str, pattern: &str) -> bool {
    let s = name.as_bytes();
    let p = pattern.as_bytes();
    let mut si = 0;
    let mut pi = 0;
    let mut restart: Option<(usize, usize)> = None;

    while si < s.len() {
        let (pch, plen) = match p.get(pi).copied() {
            Some(b'\\') => (p.get(pi + 1).copied(), 2),
            other => (other, 1),
        };
        match pch {
            Some(b'*') if plen == 1 => {
                while p.get(pi) == Some(&b'*') {
                    pi += 1;
                }
                if pi == p.len() {
                    return true;
                }
                restart = Some((pi, si));
            }
            Some(b'?') if plen == 1 => {
                si += 1;
                pi += 1;
            }
            Some(c) if c == s[si] => {
                si += 1;
                pi += plen;
            }
            _ => match restart {
                // A literal mismatch after a star widens the star by one
                // byte and tries again from there.
                Some((rp, rs)) => {
                    pi = rp;
                    si = rs + 1;
                    restart = Some((rp, rs + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == b'*')
}

/// Stream one directory's listing. `.` and `..` are reported like any other
/// entry; hidden files are held back unless `-a` was given. Entries whose
/// stat fails are logged and skipped rather than failing the whole listing.
pub async fn send_listing<W: AsyncWrite + Unpin>(
    writer: &mut FdWriter<W>,
    rpath: &Path,
    flags: ListFlags,
    pattern: Option<&str>,
) -> io::Result<()> {
    let now = Local::now().timestamp();

    let mut entries: Vec<(String, std::fs::Metadata)> = Vec::new();
    for name in [".", ".."] {
        if let Ok(meta) = fs::symlink_metadata(rpath.join(name)).await {
            entries.push((name.to_string(), meta));
        }
    }
    let mut dir = fs::read_dir(rpath).await?;
    while let Some(ent) = dir.next_entry().await? {
        let name = ent.file_name().to_string_lossy().into_owned();
        match fs::symlink_metadata(ent.path()).await {
            Ok(meta) => entries.push((name, meta)),
            Err(e) => warn!("listing: stat {:?} failed: {}", ent.path(), e),
        }
    }

    for (name, meta) in &entries {
        if suppressed(name, flags, pattern) {
            continue;
        }
        if flags.long {
            write_long_row(writer, rpath, name, meta, flags, now).await?;
        } else {
            writer.write(name.as_bytes()).await?;
            if flags.type_suffix {
                if let Some(c) = type_suffix(meta.mode()) {
                    writer.write(&[c as u8]).await?;
                }
            }
            writer.write(b"\n").await?;
        }
    }
    Ok(())
}

fn suppressed(name: &str, flags: ListFlags, pattern: Option<&str>) -> bool {
    let dot_entry = name == "." || name == "..";
    if name.starts_with('.') && !dot_entry && !flags.all {
        return true;
    }
    if flags.skip_dotdot && name == ".." {
        return true;
    }
    match pattern {
        Some(pat) => !wildcard_match(name, pat),
        None => false,
    }
}

async fn write_long_row<W: AsyncWrite + Unpin>(
    writer: &mut FdWriter<W>,
    rpath: &Path,
    name: &str,
    meta: &std::fs::Metadata,
    flags: ListFlags,
    now: i64,
) -> io::Result<()> {
    let mode = meta.mode();
    let mut row = format!(
        "{:>10} {:>3} {:<8} {:<8} ",
        mode_string(mode),
        meta.nlink(),
        "ftp",
        "ftp"
    );

    match mode & libc::S_IFMT {
        libc::S_IFCHR | libc::S_IFBLK => {
            row.push_str(&format!(
                "{:>3},{:>3}",
                libc::major(meta.rdev()),
                libc::minor(meta.rdev())
            ));
        }
        _ => row.push_str(&format!("{:>7}", meta.size())),
    }

    row.push_str(&format!(" {:>12} {}", mtime_string(meta.mtime(), now), name));

    if flags.type_suffix && !meta.file_type().is_symlink() {
        if let Some(c) = type_suffix(mode) {
            row.push(c);
        }
    }
    if meta.file_type().is_symlink() {
        row.push_str(" -> ");
        if let Ok(target) = fs::read_link(rpath.join(name)).await {
            row.push_str(&target.to_string_lossy());
        }
    }

    writer.write(row.as_bytes()).await?;
    writer.write(b"\n").await
}

fn mode_string(mode: u32) -> String {
    let kind = match mode & libc::S_IFMT {
        libc::S_IFIFO => 'p',
        libc::S_IFCHR => 'c',
        libc::S_IFDIR => 'd',
        libc::S_IFBLK => 'b',
        libc::S_IFREG => '-',
        libc::S_IFLNK => 'l',
        libc::S_IFSOCK => 's',
        _ => '?',
    };

    let mut out = String::with_capacity(10);
    out.push(kind);
    for (bit, ch) in [
        (libc::S_IRUSR, 'r'),
        (libc::S_IWUSR, 'w'),
        (libc::S_IXUSR, 'x'),
        (libc::S_IRGRP, 'r'),
        (libc::S_IWGRP, 'w'),
        (libc::S_IXGRP, 'x'),
        (libc::S_IROTH, 'r'),
        (libc::S_IWOTH, 'w'),
        (libc::S_IXOTH, 'x'),
    ] {
        out.push(if mode & bit != 0 { ch } else { '-' });
    }
    out
}

fn mtime_string(mtime: i64, now: i64) -> String {
    let when = DateTime::from_timestamp(mtime, 0)
        .unwrap_or_default()
        .with_timezone(&Local);
    if now - mtime > RECENT_SECONDS {
        when.format("%b %e  %Y").to_string()
    } else {
        when.format("%b %e %H:%M").to_string()
    }
}

/// Trailing type marker for `-F`: the same characters ls uses.
fn type_suffix(mode: u32) -> Option<char> {
    match mode & libc::S_IFMT {
        libc::S_IFDIR => Some('/'),
        libc::S_IFLNK => Some('@'),
        libc::S_IFCHR => Some('%'),
        libc::S_IFBLK => Some('#'),
        libc::S_IFIFO => Some('|'),
        libc::S_IFSOCK => Some('='),
        _ => None,
    }
}
