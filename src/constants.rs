// src/constants.rs

/// Longest control-connection command line accepted, terminator included.
pub const MAX_COMMAND_LINE: usize = 512;

/// Buffered stream capacity, per direction.
pub const STREAM_BUF_SIZE: usize = 8192;

/// Attempts when binding an active-mode source port that is in use.
pub const BIND_RETRIES: u32 = 10;

/// Service name looked up under the port-lease rendezvous directory.
pub const RPA_SERVICE: &str = "ftp";

/// Where complaints in the HELP output should go.
pub const COMMENTS_TO: &str = "the system administrator";

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ferroftpd.conf";
