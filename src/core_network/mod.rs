pub mod ftpdata;
pub mod network;
pub mod pasv;
pub mod port;

pub use network::ServerCtx;
