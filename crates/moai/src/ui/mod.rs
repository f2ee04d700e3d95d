//! Terminal presentation for the `moai` binary

pub mod progress;
pub mod summary;
