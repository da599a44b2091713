pub mod builder;
pub mod index;

pub use builder::*;
pub use index::*;
