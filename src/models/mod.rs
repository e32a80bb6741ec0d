pub mod label;
pub mod task;

pub use label::*;
pub use task::*;
