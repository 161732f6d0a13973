//! A dynamic 2D rectangle atlas allocator.
//!
//! [`AtlasManager`] sub-divides a fixed `width x height` atlas into
//! non-overlapping allocated rectangles and reclaims their space on
//! release, coalescing freed regions back into larger ones so that later
//! allocations can reuse them.
//!
//! The placement strategy is best-fit by area: on `allocate`, the smallest
//! free leaf that can contain the requested size is chosen among two
//! ordered indices (one sorted primarily by width, the other primarily by
//! height). The chosen leaf is split into 2 or 3 children if it is larger
//! than requested. On `free`, the freed leaf is merged back into its
//! parent whenever every sibling is also a free leaf, walking up towards
//! the root until a non-mergeable ancestor is reached.
//!
//! See [`AtlasManager`] for the full API.

mod allocator;
mod svg;

pub use crate::allocator::{AtlasManager, Region, INVALID_REGION};
pub use crate::svg::dump_svg;
