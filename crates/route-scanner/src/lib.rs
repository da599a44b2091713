pub mod result;
pub mod scan;

pub use result::*;
pub use scan::*;
