//! dirmirror integration test suite
//!
//! Shared fixtures for the end-to-end tests under `tests/` and the benchmarks
//! under `benches/`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
///
/// Temporary source/destination trees and helpers to inspect them.
pub mod test_utils;
