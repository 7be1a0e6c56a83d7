use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;
use std::io::Write;

use ferroftpd::config::Config;
use ferroftpd::constants::DEFAULT_CONFIG_PATH;
use ferroftpd::core_cli::Cli;
use ferroftpd::server;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let mut config = if args.config.is_empty() {
        // The stock config path is optional; defaults serve a usable
        // read-only anonymous area.
        if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
            Config::load_from_file(DEFAULT_CONFIG_PATH)?
        } else {
            info!("no {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
            Config::default()
        }
    } else {
        Config::load_from_file(&args.config)?
    };

    if let Some(port) = args.port {
        config.server.listen_port = port;
    }
    if args.read_write {
        config.server.read_write = true;
    }

    if args.inetd {
        server::serve_one(config).await
    } else {
        server::run(config).await
    }
}
