pub mod catalog;
pub mod cluster;
pub mod dimension;
pub mod loader;
pub mod metric;

pub use catalog::*;
pub use cluster::*;
pub use dimension::*;
pub use loader::*;
pub use metric::*;
