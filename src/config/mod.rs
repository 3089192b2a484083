mod structs;
pub mod validators;

pub use structs::*;
