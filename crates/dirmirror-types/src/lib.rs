//! Core type system and error handling for dirmirror
//!
//! This crate provides the foundational types shared by every dirmirror crate:
//!
//! - **Error handling**: one error enum that separates fatal run conditions from
//!   recoverable, per-item failures
//! - **Canonical paths**: string paths with a single separator convention, the
//!   identity key for matching files across two trees
//! - **Plan types**: tasks, operations, operation sets and statistics
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use dirmirror_types::{CanonicalPath, Operation, OperationReason, OperationSet};
//!
//! let root = CanonicalPath::from_canonical("/backup/");
//! let mut plan = OperationSet::new();
//! plan.insert(Operation::delete(root.join_relative("stale.txt")));
//! assert_eq!(plan.len(), 1);
//! assert_eq!(
//!     plan.iter().next().map(|op| op.reason),
//!     Some(OperationReason::MissingInSource)
//! );
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use config::Concurrency;
pub use error::{Error, ErrorKind};
pub use result::Result;
pub use types::*;
