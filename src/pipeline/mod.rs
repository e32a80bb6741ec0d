pub mod batch;
pub mod export;
pub mod extraction;
pub mod vision;
