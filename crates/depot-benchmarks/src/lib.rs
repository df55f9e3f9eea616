//! depot benchmarking suite
//!
//! Benchmarks for selector resolution, graph building and manifest and
//! lock file parsing, with shared fixtures in [`common`].

pub mod common;

pub use common::*;
