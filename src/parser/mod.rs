pub mod aggregator;
pub mod burst;
pub mod main;
pub mod retry;
pub mod sentence;
pub mod source;

pub use aggregator::*;
pub use burst::*;
pub use main::*;
pub use retry::*;
pub use sentence::*;
pub use source::*;
