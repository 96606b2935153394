mod hybrid;
mod vector;

pub use hybrid::fuse;
pub use vector::{search_full_memory, search_indexed};
