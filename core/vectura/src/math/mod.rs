mod kernel;

pub use kernel::{cosine_batch, l2_norm, normalize, ZeroNorm};
