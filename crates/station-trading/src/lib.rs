pub mod command;
pub mod result;
pub mod scan;

pub use command::*;
pub use result::*;
pub use scan::*;
