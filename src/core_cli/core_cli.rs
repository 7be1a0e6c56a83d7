use clap::Parser;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "ferroftpd", about = "An anonymous FTP server written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Listen port override
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Allow uploads, deletes and renames
    #[arg(short = 'w', long)]
    pub read_write: bool,

    /// Serve a single already-connected control socket on stdin, then exit
    #[arg(short, long)]
    pub inetd: bool,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}
