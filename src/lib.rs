//! Placegraft: Structural Place Merging and Publishing
//!
//! Grafts build-artifact subtrees into base place snapshots at the paths a
//! project file manages, keeping referents unique, then publishes the merged
//! places with bounded, conflict-aware retries.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod merge;
pub mod prepare;
pub mod project;
pub mod publish;
pub mod tree;
