pub mod xferlog;

pub use xferlog::{XferEntry, Xferlog};
