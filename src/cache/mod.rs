pub mod memory;
pub mod traits;

pub use memory::TtlCache;
pub use traits::{CacheResult, ObjectCache};
