//! Virtual path handling.
//!
//! Clients only ever see virtual paths rooted at `/`. `path_mk` merges the
//! session's working directory with a command argument and normalizes the
//! result; `path_v2r` maps that onto the real filesystem below the configured
//! root. Confinement rests on the normalization step: `..` can never climb
//! above `/`, so the mapped path can never leave the root. Symlinks inside
//! the tree are not chased here; that is a deployment concern.

use std::fs;
use std::path::PathBuf;

use crate::config::ServerConfig;

/// Merge the working directory and a command argument into a normalized
/// virtual path. Absolute arguments replace the working directory; empty,
/// `.` and `..` segments are resolved lexically, with `..` clamped at the
/// root.
pub fn path_mk(cwd: &str, arg: &str) -> String {
    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else {
        format!("{}/{}", cwd, arg)
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Map a normalized virtual path to its real filesystem location.
///
/// `/~user[/rest]` maps into that user's home joined with the configured
/// public-FTP subdirectory, when that feature is enabled; everything else
/// lands under the server root. `None` means the path cannot be resolved
/// (unknown user), which callers report as a parameter error.
pub fn path_v2r(vpath: &str, config: &ServerConfig) -> Option<PathBuf> {
    if !config.public_ftp_dir.is_empty() {
        if let Some(rest) = vpath.strip_prefix("/~") {
            let (user, tail) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i + 1..]),
                None => (rest, ""),
            };
            let home = home_dir(user)?;
            let mut real = PathBuf::from(home);
            real.push(&config.public_ftp_dir);
            if !tail.is_empty() {
                real.push(tail);
            }
            return Some(real);
        }
    }

    let mut real = PathBuf::from(&config.ftp_root);
    if let Some(rest) = vpath.strip_prefix('/') {
        if !rest.is_empty() {
            real.push(rest);
        }
    }
    Some(real)
}

fn home_dir(user: &str) -> Option<String> {
    let passwd = fs::read_to_string("/etc/passwd").ok()?;
    lookup_home(&passwd, user)
}

/// Scan passwd-format text (`name:pw:uid:gid:gecos:home:shell`) for a user's
/// home directory.
fn lookup_home(passwd: &str, user: &str) -> Option<String> {
    for line in passwd.lines() {
        let mut fields = line.split(':');
        if fields.next() == Some(user) {
            return fields.nth(4).map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_relative_arguments_onto_the_cwd() {
        assert_eq!(path_mk("/pub", "incoming"), "/pub/incoming");
        assert_eq!(path_mk("/", "pub"), "/pub");
        assert_eq!(path_mk("/pub", ""), "/pub");
    }

    #[test]
    fn absolute_arguments_replace_the_cwd() {
        assert_eq!(path_mk("/pub/deep", "/other"), "/other");
    }

    #[test]
    fn normalization_strips_dot_and_empty_segments() {
        assert_eq!(path_mk("/", "a//b///c"), "/a/b/c");
        assert_eq!(path_mk("/", "./a/./b/."), "/a/b");
        assert_eq!(path_mk("/a/b/", "c/"), "/a/b/c");
    }

    #[test]
    fn dotdot_removes_the_previous_component() {
        assert_eq!(path_mk("/a/b", "../c"), "/a/c");
        assert_eq!(path_mk("/", "a/b/../.."), "/");
    }

    #[test]
    fn dotdot_is_clamped_at_the_root() {
        assert_eq!(path_mk("/", ".."), "/");
        assert_eq!(path_mk("/", "../../.."), "/");
        assert_eq!(path_mk("/pub", "../../../etc/passwd"), "/etc/passwd");
    }

    #[test]
    fn resolved_paths_stay_under_the_root() {
        let config = ServerConfig::default();
        let hostile = [
            "..",
            "../..",
            "/..",
            "/../../",
            "../../../etc/passwd",
            "a/b/../../../../x",
            "//..//..//etc",
            "./../.",
            "....//",
        ];
        for arg in hostile {
            let vpath = path_mk("/pub/incoming", arg);
            let real = path_v2r(&vpath, &config).unwrap();
            assert!(
                real.starts_with(&config.ftp_root),
                "{arg:?} resolved outside the root: {real:?}"
            );
        }
    }

    #[test]
    fn root_maps_to_the_configured_root() {
        let config = ServerConfig::default();
        assert_eq!(
            path_v2r("/", &config).unwrap(),
            PathBuf::from(&config.ftp_root)
        );
    }

    #[test]
    fn tilde_paths_are_plain_names_when_disabled() {
        let config = ServerConfig::default();
        let real = path_v2r("/~alice/file", &config).unwrap();
        assert_eq!(
            real,
            PathBuf::from(&config.ftp_root).join("~alice").join("file")
        );
    }

    #[test]
    fn passwd_scan_returns_the_home_field() {
        let passwd = "root:x:0:0:root:/root:/bin/bash\n\
                      alice:x:1000:1000:Alice:/home/alice:/bin/sh\n\
                      bob:x:1001:1001::/home/bob:/usr/sbin/nologin\n";
        assert_eq!(lookup_home(passwd, "alice").as_deref(), Some("/home/alice"));
        assert_eq!(lookup_home(passwd, "bob").as_deref(), Some("/home/bob"));
        assert_eq!(lookup_home(passwd, "mallory"), None);
        assert_eq!(lookup_home(passwd, ""), None);
    }
}
