pub mod dashboard;
pub mod paths;
pub mod signal;

pub use dashboard::*;
pub use paths::*;
pub use signal::*;
