pub mod evaluate;
pub mod result;
pub mod ships;

#[cfg(test)]
mod tests;

pub use evaluate::*;
pub use result::*;
pub use ships::*;
