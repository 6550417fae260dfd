//! Prelude module - commonly used test helpers.
//!
//! Use `use quarry_test::prelude::*;` to import them.

pub use crate::{
    DenyListPolicy, IndexCall, IndexCallKind, RecordingIndex, TestMount, setup_test_logging,
    test_dir, tree_snapshot, visible_snapshot,
};
