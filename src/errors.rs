/// Errors that can be returned by tree operations.
///
/// `InvalidArgument` marks a caller contract violation; the tree's caches
/// may be left inconsistent and the tree must not be used afterwards.
/// `OutOfCapacity` is signaled distinctly so that a forest-level caller can
/// evict before the next insert. A cache miss is never an error.
#[derive(Debug, PartialEq)]
pub enum RCFError {
    InvalidArgument {
        msg: &'static str,
    },
    OutOfCapacity {
        msg: &'static str,
    },
    MissingLeaf {
        msg: &'static str,
    },
}
