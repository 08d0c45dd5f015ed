//! Entity linking: value index plus span linker

pub mod linker;
pub mod value_index;

pub use linker::*;
pub use value_index::*;
