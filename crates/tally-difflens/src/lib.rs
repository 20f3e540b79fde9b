//! Diff parsing, line counting, ignore patterns and language inference.
//!
//! Turns the raw patch of a commit into per-file line counts and decides
//! which language, if any, each changed file counts towards.

pub mod ignore;
pub mod language;
pub mod lines;
pub mod parser;
