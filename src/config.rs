use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub listen_port: u16,
    /// Real directory the virtual root maps to.
    pub ftp_root: String,
    /// Subdirectory of a user's home served for `/~user` paths.
    /// Empty disables the mapping.
    pub public_ftp_dir: String,
    pub read_write: bool,
    /// Concurrent session cap; 0 means unlimited.
    pub max_sessions: usize,
    /// 5xx replies tolerated before the session is dropped.
    pub max_errors: u32,
    pub idle_timeout_secs: u64,
    pub pasv_timeout_secs: u64,
    /// Create-mode mask as an octal string, e.g. "022".
    pub umask: String,
    pub welcome_file: String,
    /// Per-directory message file name, shown on login and CWD.
    pub message_file: String,
    /// Transfer log path; empty disables transfer logging.
    pub xferlog_path: String,
    /// Rendezvous directory of the privileged-port lease service.
    pub rpad_dir: String,
    /// Source port requested from the lease service for active transfers.
    pub ftp_data_port: u16,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: String::from("0.0.0.0"),
            listen_port: 2121,
            ftp_root: String::from("/srv/ftp"),
            public_ftp_dir: String::new(),
            read_write: false,
            max_sessions: 64,
            max_errors: 5,
            idle_timeout_secs: 15 * 60,
            pasv_timeout_secs: 120,
            umask: String::from("022"),
            welcome_file: String::from("/etc/welcome.txt"),
            message_file: String::from(".message"),
            xferlog_path: String::new(),
            rpad_dir: String::from("/var/run/rpad"),
            ftp_data_port: 20,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;
        Ok(config)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.server.idle_timeout_secs)
    }

    pub fn pasv_timeout(&self) -> Duration {
        Duration::from_secs(self.server.pasv_timeout_secs)
    }

    /// Initial create-mode mask; malformed values fall back to 022.
    pub fn umask_bits(&self) -> u32 {
        u32::from_str_radix(self.server.umask.trim(), 8).unwrap_or(0o022)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = toml::from_str("[server]\nlisten_port = 21\n").unwrap();
        assert_eq!(config.server.listen_port, 21);
        assert_eq!(config.server.max_errors, 5);
        assert_eq!(config.server.ftp_root, "/srv/ftp");
        assert!(!config.server.read_write);
    }

    #[test]
    fn umask_parses_octal() {
        let mut config = Config::default();
        config.server.umask = String::from("027");
        assert_eq!(config.umask_bits(), 0o027);
        config.server.umask = String::from("bogus");
        assert_eq!(config.umask_bits(), 0o022);
    }
}
