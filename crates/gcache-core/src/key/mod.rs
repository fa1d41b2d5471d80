//! Cache key construction and canonical serialization.

mod canonical;
mod descriptor;

pub use canonical::{CacheKey, Layer, RESERVED_USE_CASE};
pub use descriptor::KeyDescriptor;
