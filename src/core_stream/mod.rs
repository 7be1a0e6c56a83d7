pub mod fdbuf;
pub mod telnet;

pub use fdbuf::{FdReader, FdWriter, SharedWriter};
