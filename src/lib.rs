//! The single-tree core of a random cut forest: bounded node storage, the
//! insert/delete update protocol over a sliding window of points, and the
//! scoring traversals used for anomaly detection on streams.
//!
//! A tree stores its interior nodes column-wise in a bounded arena with an
//! explicit free list; leaves are addressed in the same integer namespace as
//! interior slots, offset by the arena capacity. Each interior node may
//! carry a cached bounding box and range sum; the cache covers a
//! configurable fraction of the slots and is rebuilt lazily where it is
//! missing or stale.
//!
//! ```ignore
//! use rcftree::{RCFTreeOptions, VectorizedPointStore, VisitorInfo};
//!
//! let mut store = VectorizedPointStore::new(2, 1024)?;
//! let mut tree = RCFTreeOptions::new(2, 256)
//!     .store_sequences_enabled(true)
//!     .random_seed(17)
//!     .build(&store)?;
//!
//! // stream points through the tree; the update coordinator settles
//! // reference counts from the returned (inserted, evicted) pairs
//! for (sequence, point) in data.iter().enumerate() {
//!     let index = store.add(point)?;
//!     let result = tree.update(index, sequence as u64, &store)?;
//!     store.adjust_count(&[result])?;
//!     store.dec(index)?;
//! }
//!
//! let score = tree.score(&query, &store)?;
//! ```
//!
//! ### References
//!
//! Sudipto Guha, Nina Mishra, Gourav Roy, and Okke Schrijvers. *"Robust random
//! cut forest based anomaly detection on streams."* International Conference
//! on Machine Learning, pp. 2712-2721. PMLR, 2016.

pub mod common;
pub mod errors;
pub mod pointstore;
pub mod tree;
pub mod types;
mod util;
pub mod visitor;

pub use crate::{
    errors::RCFError,
    pointstore::{PointStoreView, VectorizedPointStore},
    tree::{
        boundingbox::BoundingBox,
        cut::Cut,
        nodestore::{NodeStoreView, VectorNodeStore, NULL_NODE, SWITCH_FRACTION},
        nodeview::NodeView,
        randomcuttree::{
            RCFTree, RCFTreeLarge, RCFTreeMedium, RCFTreeOptions, RCFTreeSmall, RandomCutTree,
            TreeColumns,
        },
    },
    visitor::{
        scalarscorevisitor::ScalarScoreVisitor,
        visitor::{MultiVisitor, Visitor, VisitorInfo},
    },
};
