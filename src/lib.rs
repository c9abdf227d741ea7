//! `buildstat` — build-report mailing-list statistics.
//!
//! This crate fetches monthly compressed mailing-list archives, parses the
//! build-report messages they contain, and rolls the pass/fail results up by
//! month and year.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod parser;
pub mod pipeline;
