//! Quarry Test - Shared test utilities for the Quarry virtual file system.
//!
//! This crate provides a throwaway mount fixture, recording and denying
//! collaborators, and on-disk tree snapshots. Use it as a dev-dependency.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quarry_test::TestMount;
//!
//! #[test]
//! fn test_create() {
//!     let t = TestMount::new();
//!     t.create("/", "a.txt", "hello");
//!     assert_eq!(t.read("/a.txt"), "hello");
//!     assert!(t.index.calls().iter().any(|c| c.path == "/a.txt"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod harness;
pub mod mocks;
pub mod snapshot;

pub use harness::*;
pub use mocks::*;
pub use snapshot::*;
