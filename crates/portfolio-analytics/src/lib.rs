pub mod pnl;
pub mod risk;

pub use pnl::*;
pub use risk::*;
