//! Benchmark catalogues and output parsers
//!
//! The harness runs opaque command strings on an execution backend and
//! hands the captured stdout to a tool-specific parser. This crate holds
//! both sides of that: the fixed catalogues of workload commands (fio disk
//! I/O tests, an Xcode build-time benchmark) and the parsers that turn
//! their raw output into numbers.

pub mod fio;
pub mod xcode;

/// A named workload command
#[derive(Debug, Clone, Copy)]
pub struct Benchmark {
    /// Human-readable name for reports
    pub name: &'static str,
    /// Command string run verbatim on the backend
    pub command: &'static str,
}
