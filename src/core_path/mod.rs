pub mod path;

pub use path::{path_mk, path_v2r};
