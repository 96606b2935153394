mod file;
mod traits;

pub use file::FileStorage;
pub use traits::{IndexedStorage, Storage};
