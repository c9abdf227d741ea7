//! Core data model: month keys, cached archive records, messages and build results.

pub mod archive;
pub mod build;
pub mod message;
pub mod month;
pub mod sender;
