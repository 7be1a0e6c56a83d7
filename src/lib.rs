pub mod config;
pub mod constants;
pub mod core_cli;
pub mod core_ftpcommand;
pub mod core_ftplist;
pub mod core_log;
pub mod core_network;
pub mod core_path;
pub mod core_rpa;
pub mod core_stream;
pub mod core_timeout;
pub mod helpers;
pub mod server;
pub mod session;

pub use config::Config;
