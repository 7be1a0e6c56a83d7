pub mod ftplist;

pub use ftplist::{parse_flags, send_listing, split_pattern, wildcard_match, ListFlags};
