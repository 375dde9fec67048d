use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    mem,
};

use crate::{
    common::intervalstoremanager::IntervalStoreManager,
    errors::RCFError,
    pointstore::PointStoreView,
    tree::{boundingbox::BoundingBox, cut::Cut},
    types::{Location, Result},
    util::check_argument,
};

/// Index value marking an absent root or an absent parent of the root.
pub const NULL_NODE: usize = usize::MAX;

/// Below this cache fraction a traversal threads its own bounding box
/// instead of looking boxes up per node.
pub const SWITCH_FRACTION: f64 = 0.499;

///
/// `capacity` is the number of interior node slots of the tree; a sliding
/// window of `capacity` samples needs at most `capacity - 1` of them, which
/// leaves one slot of headroom for the insert-then-evict order of an update.
///
/// A single integer namespace covers all node references:
///   * `0..capacity` is an interior slot,
///   * `capacity` is the unset sentinel stored in the child/parent columns,
///   * `capacity + 1 + p` is the leaf over point-store index `p`,
///   * `NULL_NODE` marks an absent root.
///
/// Columns are width specialized: `C` types the cut dimension, `P` the
/// child/parent columns (which must also fit composite leaf indices), and
/// `N` node masses, stored as `mass - 1` so that a window of `capacity`
/// samples fits the same width as the slot indices.
///
#[repr(C)]
pub struct VectorNodeStore<C, P, N>
where
    C: Location,
    usize: From<C>,
    P: Location,
    usize: From<P>,
    N: Location,
    usize: From<N>,
{
    capacity: usize,
    dimensions: usize,
    store_parent: bool,
    store_point_sum: bool,
    store_sequences: bool,
    bounding_box_cache_fraction: f64,
    parent_index: Vec<N>,
    mass: Vec<N>,
    pub left_index: Vec<P>,
    pub right_index: Vec<P>,
    pub cut_dimension: Vec<C>,
    pub cut_value: Vec<f32>,
    bounding_box_data: Vec<f32>,
    range_sum_data: Vec<f64>,
    point_sum_data: Vec<f32>,
    leaf_mass: HashMap<usize, usize>,
    sequence_map: HashMap<usize, HashMap<u64, usize>>,
    sequence_order: BTreeMap<u64, usize>,
    pub internal_node_manager: IntervalStoreManager<usize>,
}

/// The read-only face of the node store used by traversals and views.
pub trait NodeStoreView {
    fn mass(&self, index: usize) -> usize;
    fn bounding_box(&self, index: usize, point_store: &dyn PointStoreView) -> BoundingBox;
    fn probability_of_cut(
        &self,
        index: usize,
        point: &[f32],
        point_store: &dyn PointStoreView,
    ) -> f64;
    fn cached_probability_of_cut(&self, index: usize, point: &[f32]) -> Option<f64>;
    fn grow_node_box(
        &self,
        bounding_box: &mut BoundingBox,
        point_store: &dyn PointStoreView,
        node: usize,
        sibling: usize,
    );
    fn sibling_of(&self, node: usize, parent: usize) -> usize;
    fn leaf_point_index(&self, index: usize) -> Result<usize>;
    fn cut_dimension_of(&self, index: usize) -> usize;
    fn cut_value_of(&self, index: usize) -> f32;
    fn left_of(&self, index: usize) -> usize;
    fn right_of(&self, index: usize) -> usize;
    fn cut_and_children(&self, index: usize) -> (usize, f32, usize, usize);
    fn is_leaf(&self, index: usize) -> bool;
    fn is_internal(&self, index: usize) -> bool;
    fn is_left_of(&self, index: usize, point: &[f32]) -> bool;
    fn use_path_for_box(&self) -> bool;
    fn set_path(&self, answer: &mut Vec<(usize, usize)>, root: usize, point: &[f32]);
    fn null_node(&self) -> usize;
}

impl<C, P, N> VectorNodeStore<C, P, N>
where
    C: Location,
    usize: From<C>,
    P: Location,
    usize: From<P>,
    N: Location,
    usize: From<N>,
    <C as TryFrom<usize>>::Error: Debug,
    <P as TryFrom<usize>>::Error: Debug,
    <N as TryFrom<usize>>::Error: Debug,
{
    pub fn new(
        capacity: usize,
        dimensions: usize,
        store_parent: bool,
        store_point_sum: bool,
        store_sequences: bool,
        bounding_box_cache_fraction: f64,
    ) -> Result<Self> {
        check_argument(capacity > 0, " capacity must be positive")?;
        check_argument(dimensions > 0, " dimensions must be positive")?;
        check_argument(
            (0.0..=1.0).contains(&bounding_box_cache_fraction),
            " cache fraction must be in [0,1]",
        )?;
        check_argument(
            capacity <= N::MAX.into() && capacity <= P::MAX.into(),
            " invalid parameter, increase index widths to represent capacity",
        )?;
        check_argument(
            dimensions - 1 <= C::MAX.into(),
            " invalid parameter, increase cut dimension width",
        )?;
        let cache_limit: usize = (bounding_box_cache_fraction * capacity as f64) as usize;
        let sentinel: usize = capacity;
        Ok(VectorNodeStore {
            capacity,
            dimensions,
            store_parent,
            store_point_sum,
            store_sequences,
            bounding_box_cache_fraction,
            left_index: vec![sentinel.try_into().unwrap(); capacity],
            right_index: vec![sentinel.try_into().unwrap(); capacity],
            mass: vec![0.try_into().unwrap(); capacity],
            parent_index: if store_parent {
                vec![sentinel.try_into().unwrap(); capacity]
            } else {
                Vec::new()
            },
            cut_value: vec![0.0; capacity],
            cut_dimension: vec![C::MAX; capacity],
            bounding_box_data: vec![0.0; 2 * dimensions * cache_limit],
            range_sum_data: vec![0.0; cache_limit],
            point_sum_data: if store_point_sum {
                vec![0.0; dimensions * capacity]
            } else {
                Vec::new()
            },
            leaf_mass: HashMap::new(),
            sequence_map: HashMap::new(),
            sequence_order: BTreeMap::new(),
            internal_node_manager: IntervalStoreManager::<usize>::new(capacity),
        })
    }

    fn sentinel(&self) -> usize {
        self.capacity
    }

    fn cache_enabled(&self) -> bool {
        !self.range_sum_data.is_empty()
    }

    pub fn leaf_index(&self, point_index: usize) -> usize {
        point_index + self.capacity + 1
    }

    fn point_index(&self, index: usize) -> usize {
        index - self.capacity - 1
    }

    /// Cache slot of an interior node, or `usize::MAX` when the node lies
    /// outside the cached window. A miss is not an error; readers fall back
    /// to reconstruction.
    fn translate(&self, index: usize) -> usize {
        if index < self.range_sum_data.len() {
            index
        } else {
            usize::MAX
        }
    }

    fn slot_filled(&self, idx: usize) -> bool {
        self.range_sum_data[idx] != 0.0
    }

    fn copy_box_to_data(&mut self, index: usize, bounding_box: &BoundingBox) {
        let idx = self.translate(index);
        if idx != usize::MAX {
            let base = 2 * idx * self.dimensions;
            let mid = base + self.dimensions;
            self.bounding_box_data[base..mid].copy_from_slice(bounding_box.get_min_values());
            self.bounding_box_data[mid..mid + self.dimensions]
                .copy_from_slice(bounding_box.get_max_values());
            self.range_sum_data[idx] = bounding_box.get_range_sum();
        }
    }

    /// Grows the cached box by `point` and returns true iff the stored
    /// range sum was reproduced, i.e. the point was already contained. The
    /// ancestor fix-up uses the return to stop early.
    pub fn check_contains_and_add_point(&mut self, index: usize, point: &[f32]) -> bool {
        let idx = self.translate(index);
        if idx != usize::MAX && self.slot_filled(idx) {
            let base = 2 * idx * self.dimensions;
            let mid = base + self.dimensions;
            let minarray = &mut self.bounding_box_data[base..mid];
            for (x, y) in minarray.iter_mut().zip(point) {
                *x = if *x > *y { *y } else { *x };
            }
            let maxarray = &mut self.bounding_box_data[mid..mid + self.dimensions];
            for (x, y) in maxarray.iter_mut().zip(point) {
                *x = if *x < *y { *y } else { *x };
            }
            let newminarray = &self.bounding_box_data[base..mid];
            let newmaxarray = &self.bounding_box_data[mid..mid + self.dimensions];
            let newsum: f64 = newminarray
                .iter()
                .zip(newmaxarray)
                .map(|(x, y)| (y - x) as f64)
                .sum();
            let answer = self.range_sum_data[idx] == newsum;
            self.range_sum_data[idx] = newsum;
            return answer;
        }
        false
    }

    /// True iff the cached box contains `point` with strict inequality on
    /// both sides in every dimension.
    pub fn check_strictly_contains(&self, index: usize, point: &[f32]) -> bool {
        let idx = self.translate(index);
        if idx != usize::MAX && self.slot_filled(idx) {
            let base = 2 * idx * self.dimensions;
            let mid = base + self.dimensions;
            let minarray = &self.bounding_box_data[base..mid];
            let maxarray = &self.bounding_box_data[mid..mid + self.dimensions];
            let not_inside = minarray
                .iter()
                .zip(point)
                .zip(maxarray)
                .any(|((x, y), z)| x >= y || y >= z);
            return !not_inside;
        }
        false
    }

    fn box_from_data(&self, idx: usize) -> BoundingBox {
        let dimensions = self.dimensions;
        let base = 2 * idx * dimensions;
        BoundingBox::new(
            &self.bounding_box_data[base..base + dimensions],
            &self.bounding_box_data[base + dimensions..base + 2 * dimensions],
        )
    }

    /// Tight box of an interior node recomputed from its subtree, filling
    /// every empty cache slot encountered along the way.
    pub fn reconstruct_box(
        &mut self,
        index: usize,
        point_store: &dyn PointStoreView,
    ) -> BoundingBox {
        let left: usize = self.left_index[index].into();
        let right: usize = self.right_index[index].into();
        let mut bounding_box = self.filled_box(left, point_store);
        let right_box = self.filled_box(right, point_store);
        bounding_box.add_box(&right_box);
        bounding_box
    }

    fn filled_box(&mut self, index: usize, point_store: &dyn PointStoreView) -> BoundingBox {
        if self.is_leaf(index) {
            let point = point_store.reference(self.point_index(index));
            BoundingBox::new(point, point)
        } else {
            let idx = self.translate(index);
            if idx != usize::MAX && self.slot_filled(idx) {
                return self.box_from_data(idx);
            }
            let bounding_box = self.reconstruct_box(index, point_store);
            if idx != usize::MAX {
                self.copy_box_to_data(index, &bounding_box);
            }
            bounding_box
        }
    }

    /// Returns true iff the cached box strictly contains `point` and needed
    /// no repair; otherwise the box is rebuilt from the subtree and written
    /// back. The rebuild is the correctness backstop for deletions and for
    /// slots emptied by a cache resize.
    pub fn check_contains_and_rebuild_box(
        &mut self,
        index: usize,
        point: &[f32],
        point_store: &dyn PointStoreView,
    ) -> bool {
        let idx = self.translate(index);
        if idx == usize::MAX {
            return false;
        }
        if self.slot_filled(idx) && self.check_strictly_contains(index, point) {
            true
        } else {
            let bounding_box = self.reconstruct_box(index, point_store);
            self.copy_box_to_data(index, &bounding_box);
            false
        }
    }

    /// Creates the interior node splitting `child` from a new leaf over
    /// `point_index` along `cut`, splices it under `parent_index`, and
    /// populates its cache slot from `saved_box` (the box of the displaced
    /// subtree) grown by the new point. Fails when no interior slot is free.
    pub fn add_node(
        &mut self,
        parent_index: usize,
        point: &[f32],
        child: usize,
        point_index: usize,
        cut: Cut,
        saved_box: &BoundingBox,
    ) -> Result<usize> {
        let index = self.internal_node_manager.take()?;
        self.cut_value[index] = cut.value;
        self.cut_dimension[index] = cut.dimension.try_into().unwrap();
        if point[cut.dimension] <= cut.value {
            self.left_index[index] = self.leaf_index(point_index).try_into().unwrap();
            self.right_index[index] = child.try_into().unwrap();
        } else {
            self.left_index[index] = child.try_into().unwrap();
            self.right_index[index] = self.leaf_index(point_index).try_into().unwrap();
        }
        // not adding 1 for the new leaf since stored mass is mass - 1
        self.mass[index] = self.mass(child).try_into().unwrap();
        if self.cache_enabled() {
            let mut merged = saved_box.clone();
            merged.check_contains_and_add_point(point);
            self.copy_box_to_data(index, &merged);
        }
        if self.store_parent {
            let parent = if parent_index == NULL_NODE {
                self.sentinel()
            } else {
                parent_index
            };
            self.parent_index[index] = parent.try_into().unwrap();
            if self.is_internal(child) {
                self.parent_index[child] = index.try_into().unwrap();
            }
        }
        if parent_index != NULL_NODE {
            self.replace_node(parent_index, child, index);
        }
        Ok(index)
    }

    /// Redirects the child pointer of `grand_parent` from `parent` to
    /// `node`.
    pub fn replace_node(&mut self, grand_parent: usize, parent: usize, node: usize) {
        if parent == self.left_index[grand_parent].into() {
            self.left_index[grand_parent] = node.try_into().unwrap();
        } else {
            self.right_index[grand_parent] = node.try_into().unwrap();
        }
        if self.store_parent && self.is_internal(node) {
            self.parent_index[node] = grand_parent.try_into().unwrap();
        }
    }

    pub fn set_root(&mut self, index: usize) {
        if self.store_parent && self.is_internal(index) {
            self.parent_index[index] = self.sentinel().try_into().unwrap();
        }
    }

    pub fn delete_internal_node(&mut self, index: usize) -> Result<()> {
        let sentinel = self.sentinel();
        self.left_index[index] = sentinel.try_into().unwrap();
        self.right_index[index] = sentinel.try_into().unwrap();
        self.mass[index] = 0.try_into().unwrap();
        if self.store_parent {
            self.parent_index[index] = sentinel.try_into().unwrap();
        }
        self.cut_dimension[index] = C::MAX;
        self.cut_value[index] = 0.0;
        let idx = self.translate(index);
        if idx != usize::MAX {
            self.range_sum_data[idx] = 0.0;
        }
        if self.store_point_sum {
            self.invalidate_point_sum(index);
        }
        self.internal_node_manager.release(index)
    }

    pub fn increase_leaf_mass(&mut self, index: usize) -> Result<()> {
        check_argument(self.is_leaf(index), " incorrect call with a non-leaf index")?;
        let y = self.point_index(index);
        *self.leaf_mass.entry(y).or_insert(0) += 1;
        Ok(())
    }

    /// Decrements the duplicate count of a leaf and returns the remaining
    /// mass; zero means the leaf must be unlinked from the tree.
    pub fn decrease_leaf_mass(&mut self, index: usize) -> Result<usize> {
        check_argument(self.is_leaf(index), " incorrect call with a non-leaf index")?;
        let y = self.point_index(index);
        match self.leaf_mass.remove(&y) {
            Some(extra) => {
                if extra > 1 {
                    self.leaf_mass.insert(y, extra - 1);
                }
                Ok(extra)
            }
            None => Ok(0),
        }
    }

    /// Records a leaf occurrence and returns the composite leaf index.
    pub fn add_leaf(&mut self, point_index: usize, sequence_index: u64) -> usize {
        if self.store_sequences {
            *self
                .sequence_map
                .entry(point_index)
                .or_default()
                .entry(sequence_index)
                .or_insert(0) += 1;
            self.sequence_order.insert(sequence_index, point_index);
        }
        self.leaf_index(point_index)
    }

    /// Forgets a `(point, sequence)` occurrence; the coordinator and the
    /// tree are expected to agree on what is present.
    pub fn remove_leaf(&mut self, point_index: usize, sequence_index: u64) -> Result<()> {
        if self.store_sequences {
            let entries = self
                .sequence_map
                .get_mut(&point_index)
                .ok_or(RCFError::MissingLeaf {
                    msg: " point has no sequence entries",
                })?;
            let count = entries
                .get_mut(&sequence_index)
                .ok_or(RCFError::MissingLeaf {
                    msg: " sequence not found at leaf",
                })?;
            if *count > 1 {
                *count -= 1;
            } else {
                entries.remove(&sequence_index);
                if entries.is_empty() {
                    self.sequence_map.remove(&point_index);
                }
            }
            self.sequence_order.remove(&sequence_index);
        }
        Ok(())
    }

    /// Oldest `(sequence, point)` pair still present, used to evict on a
    /// full sliding window.
    pub fn oldest_sequence(&self) -> Option<(u64, usize)> {
        self.sequence_order.iter().next().map(|(s, p)| (*s, *p))
    }

    pub fn sequence_count(&self, point_index: usize, sequence_index: u64) -> usize {
        self.sequence_map
            .get(&point_index)
            .and_then(|entries| entries.get(&sequence_index))
            .copied()
            .unwrap_or(0)
    }

    /// Recomputes the center-of-mass row of an interior node from its two
    /// children; leaves contribute their point scaled by mass. Recomputing
    /// bottom-up keeps the rows exact so that an insert followed by the
    /// matching delete restores them bit for bit.
    pub fn recompute_point_sum(&mut self, index: usize, point_store: &dyn PointStoreView) {
        let left: usize = self.left_index[index].into();
        let right: usize = self.right_index[index].into();
        let mut row = self.child_point_sum(left, point_store);
        let other = self.child_point_sum(right, point_store);
        for (x, y) in row.iter_mut().zip(&other) {
            *x += *y;
        }
        let base = index * self.dimensions;
        self.point_sum_data[base..base + self.dimensions].copy_from_slice(&row);
    }

    fn child_point_sum(&self, index: usize, point_store: &dyn PointStoreView) -> Vec<f32> {
        if self.is_leaf(index) {
            point_store.scaled_point(self.point_index(index), self.mass(index) as f32)
        } else {
            let base = index * self.dimensions;
            self.point_sum_data[base..base + self.dimensions].to_vec()
        }
    }

    pub fn invalidate_point_sum(&mut self, index: usize) {
        let base = index * self.dimensions;
        self.point_sum_data[base..base + self.dimensions].fill(0.0);
    }

    pub fn point_sum(&self, index: usize, point_store: &dyn PointStoreView) -> Vec<f32> {
        self.child_point_sum(index, point_store)
    }

    /// Ancestor fix-up after an insert: masses grow by one, point sums are
    /// recomputed, and — until the first ancestor whose box already strictly
    /// contains the point — stale boxes are rebuilt before the point is
    /// folded in.
    pub fn manage_ancestors_add(
        &mut self,
        path: &mut Vec<(usize, usize)>,
        point: &[f32],
        point_store: &dyn PointStoreView,
        box_resolved: bool,
    ) {
        let mut resolved = box_resolved;
        while let Some((index, _)) = path.pop() {
            let val: usize = self.mass[index].into();
            self.mass[index] = (val + 1).try_into().unwrap();
            if self.store_point_sum {
                self.recompute_point_sum(index, point_store);
            }
            if self.cache_enabled() && !resolved {
                resolved = self.check_contains_and_rebuild_box(index, point, point_store);
                if !resolved {
                    self.check_contains_and_add_point(index, point);
                }
            }
        }
    }

    /// Ancestor fix-up after a delete. Box repair stops at the first
    /// ancestor that strictly contains the removed point: the deletion
    /// cannot shrink that box or any box above it.
    pub fn manage_ancestors_delete(
        &mut self,
        path: &mut Vec<(usize, usize)>,
        point: &[f32],
        point_store: &dyn PointStoreView,
        box_resolved: bool,
    ) {
        let mut resolved = box_resolved;
        while let Some((index, _)) = path.pop() {
            let val: usize = self.mass[index].into();
            self.mass[index] = (val - 1).try_into().unwrap();
            if self.store_point_sum {
                self.recompute_point_sum(index, point_store);
            }
            if self.cache_enabled() && !resolved {
                resolved = self.check_contains_and_rebuild_box(index, point, point_store);
            }
        }
    }

    /// Reallocates the cache window to `fraction`, preserving entries up to
    /// the new limit. Newly covered slots start empty and are repopulated
    /// lazily by rebuilds.
    pub fn resize_cache(&mut self, fraction: f64) -> Result<()> {
        check_argument(
            (0.0..=1.0).contains(&fraction),
            " cache fraction must be in [0,1]",
        )?;
        let new_limit = (fraction * self.capacity as f64) as usize;
        let keep = new_limit.min(self.range_sum_data.len());
        let mut new_box_data = vec![0.0f32; 2 * self.dimensions * new_limit];
        let mut new_range_sum = vec![0.0f64; new_limit];
        new_box_data[..2 * self.dimensions * keep]
            .copy_from_slice(&self.bounding_box_data[..2 * self.dimensions * keep]);
        new_range_sum[..keep].copy_from_slice(&self.range_sum_data[..keep]);
        self.bounding_box_data = new_box_data;
        self.range_sum_data = new_range_sum;
        self.bounding_box_cache_fraction = fraction;
        Ok(())
    }

    pub fn bounding_box_cache_fraction(&self) -> f64 {
        self.bounding_box_cache_fraction
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn store_sequences(&self) -> bool {
        self.store_sequences
    }

    pub fn store_point_sum(&self) -> bool {
        self.store_point_sum
    }

    /// Raw column vectors `(left, right, cutDimension, cutValue)` with the
    /// sentinel `capacity` in the child columns of unused slots.
    pub fn export_columns(&self) -> (Vec<usize>, Vec<usize>, Vec<usize>, Vec<f32>) {
        (
            self.left_index.iter().map(|&x| usize::from(x)).collect(),
            self.right_index.iter().map(|&x| usize::from(x)).collect(),
            self.cut_dimension.iter().map(|&x| usize::from(x)).collect(),
            self.cut_value.clone(),
        )
    }

    /// Loads persisted column vectors and rebuilds the derived state (free
    /// set, interior masses, parent pointers) by walking the tree from
    /// `root`. Leaf masses start at one; caches start empty.
    pub fn apply_columns(
        &mut self,
        left: &[usize],
        right: &[usize],
        cut_dimension: &[usize],
        cut_value: &[f32],
        root: usize,
    ) -> Result<usize> {
        check_argument(
            left.len() == self.capacity
                && right.len() == self.capacity
                && cut_dimension.len() == self.capacity
                && cut_value.len() == self.capacity,
            " column vectors must have length capacity",
        )?;
        let sentinel = self.sentinel();
        for slot in 0..self.capacity {
            check_argument(
                (left[slot] == sentinel) == (right[slot] == sentinel),
                " a node must have both children or neither",
            )?;
            self.left_index[slot] = left[slot].try_into().map_err(|_| {
                RCFError::InvalidArgument {
                    msg: " child index does not fit the chosen width",
                }
            })?;
            self.right_index[slot] = right[slot].try_into().map_err(|_| {
                RCFError::InvalidArgument {
                    msg: " child index does not fit the chosen width",
                }
            })?;
            if left[slot] != sentinel {
                check_argument(
                    cut_dimension[slot] < self.dimensions,
                    " cut dimension out of range",
                )?;
                self.cut_dimension[slot] = cut_dimension[slot].try_into().unwrap();
                self.cut_value[slot] = cut_value[slot];
            }
        }
        if root == NULL_NODE {
            return Ok(0);
        }
        self.column_mass(root, NULL_NODE)
    }

    fn column_mass(&mut self, index: usize, parent: usize) -> Result<usize> {
        if self.is_leaf(index) {
            return Ok(1);
        }
        check_argument(self.is_internal(index), " sentinel reached in tree walk")?;
        // a revisit of a slot shows up as a double reservation
        self.internal_node_manager.reserve(index)?;
        if self.store_parent {
            let up = if parent == NULL_NODE {
                self.sentinel()
            } else {
                parent
            };
            self.parent_index[index] = up.try_into().unwrap();
        }
        let left: usize = self.left_index[index].into();
        let right: usize = self.right_index[index].into();
        check_argument(
            left != self.sentinel() && right != self.sentinel(),
            " reachable node with unset child",
        )?;
        let total = self.column_mass(left, index)? + self.column_mass(right, index)?;
        self.mass[index] = (total - 1).try_into().unwrap();
        Ok(total)
    }

    pub fn get_size(&self) -> usize {
        (self.left_index.len() + self.right_index.len()) * mem::size_of::<P>()
            + (self.parent_index.len() + self.mass.len()) * mem::size_of::<N>()
            + self.cut_dimension.len() * mem::size_of::<C>()
            + self.cut_value.len() * mem::size_of::<f32>()
            + (self.bounding_box_data.len() + self.point_sum_data.len()) * mem::size_of::<f32>()
            + self.range_sum_data.len() * mem::size_of::<f64>()
            + self.internal_node_manager.get_size()
            + mem::size_of::<VectorNodeStore<C, P, N>>()
    }
}

impl<C, P, N> NodeStoreView for VectorNodeStore<C, P, N>
where
    C: Location,
    usize: From<C>,
    P: Location,
    usize: From<P>,
    N: Location,
    usize: From<N>,
    <C as TryFrom<usize>>::Error: Debug,
    <P as TryFrom<usize>>::Error: Debug,
    <N as TryFrom<usize>>::Error: Debug,
{
    fn mass(&self, index: usize) -> usize {
        if self.is_leaf(index) {
            let y = index - self.capacity - 1;
            return match self.leaf_mass.get(&y) {
                Some(extra) => extra + 1,
                None => 1,
            };
        }
        let base: usize = self.mass[index].into();
        base + 1
    }

    fn bounding_box(&self, index: usize, point_store: &dyn PointStoreView) -> BoundingBox {
        if self.is_leaf(index) {
            let point = point_store.reference(self.point_index(index));
            BoundingBox::new(point, point)
        } else {
            let idx = self.translate(index);
            if idx != usize::MAX && self.slot_filled(idx) {
                return self.box_from_data(idx);
            }
            let mut bounding_box =
                self.bounding_box(self.left_index[index].into(), point_store);
            self.grow_node_box(
                &mut bounding_box,
                point_store,
                index,
                self.right_index[index].into(),
            );
            bounding_box
        }
    }

    fn probability_of_cut(
        &self,
        index: usize,
        point: &[f32],
        point_store: &dyn PointStoreView,
    ) -> f64 {
        match self.cached_probability_of_cut(index, point) {
            Some(probability) => probability,
            None => self
                .bounding_box(index, point_store)
                .probability_of_cut(point),
        }
    }

    fn cached_probability_of_cut(&self, index: usize, point: &[f32]) -> Option<f64> {
        if self.is_leaf(index) {
            return None;
        }
        let idx = self.translate(index);
        if idx == usize::MAX || !self.slot_filled(idx) {
            return None;
        }
        let base = 2 * idx * self.dimensions;
        let mid = base + self.dimensions;
        let minarray = &self.bounding_box_data[base..mid];
        let maxarray = &self.bounding_box_data[mid..mid + self.dimensions];
        let minsum: f32 = minarray
            .iter()
            .zip(point)
            .map(|(&x, &y)| if x - y > 0.0 { x - y } else { 0.0 })
            .sum();
        let maxsum: f32 = point
            .iter()
            .zip(maxarray)
            .map(|(&x, &y)| if x - y > 0.0 { x - y } else { 0.0 })
            .sum();
        let sum = maxsum + minsum;
        if sum == 0.0 {
            return Some(0.0);
        }
        Some(sum as f64 / (self.range_sum_data[idx] + sum as f64))
    }

    fn grow_node_box(
        &self,
        bounding_box: &mut BoundingBox,
        point_store: &dyn PointStoreView,
        _node: usize,
        sibling: usize,
    ) {
        if self.is_leaf(sibling) {
            let point = point_store.reference(self.point_index(sibling));
            bounding_box.check_contains_and_add_point(point);
        } else {
            let idx = self.translate(sibling);
            if idx != usize::MAX && self.slot_filled(idx) {
                let dimensions = self.dimensions;
                let base = 2 * idx * dimensions;
                bounding_box
                    .check_contains_and_add_point(&self.bounding_box_data[base..base + dimensions]);
                bounding_box.check_contains_and_add_point(
                    &self.bounding_box_data[base + dimensions..base + 2 * dimensions],
                );
            } else {
                self.grow_node_box(
                    bounding_box,
                    point_store,
                    sibling,
                    self.left_index[sibling].into(),
                );
                self.grow_node_box(
                    bounding_box,
                    point_store,
                    sibling,
                    self.right_index[sibling].into(),
                );
            }
        }
    }

    fn sibling_of(&self, node: usize, parent: usize) -> usize {
        let mut sibling: usize = self.left_index[parent].into();
        if node == sibling {
            sibling = self.right_index[parent].into();
        }
        sibling
    }

    fn leaf_point_index(&self, index: usize) -> Result<usize> {
        check_argument(self.is_leaf(index), " leaf index expected")?;
        Ok(self.point_index(index))
    }

    fn cut_dimension_of(&self, index: usize) -> usize {
        self.cut_dimension[index].into()
    }

    fn cut_value_of(&self, index: usize) -> f32 {
        self.cut_value[index]
    }

    fn left_of(&self, index: usize) -> usize {
        self.left_index[index].into()
    }

    fn right_of(&self, index: usize) -> usize {
        self.right_index[index].into()
    }

    fn cut_and_children(&self, index: usize) -> (usize, f32, usize, usize) {
        if self.is_internal(index) {
            (
                self.cut_dimension[index].into(),
                self.cut_value[index],
                self.left_index[index].into(),
                self.right_index[index].into(),
            )
        } else {
            (usize::MAX, f32::MAX, usize::MAX, usize::MAX)
        }
    }

    fn is_leaf(&self, index: usize) -> bool {
        index != NULL_NODE && index > self.capacity
    }

    fn is_internal(&self, index: usize) -> bool {
        index < self.capacity
    }

    fn is_left_of(&self, index: usize, point: &[f32]) -> bool {
        let dim: usize = self.cut_dimension[index].into();
        point[dim] <= self.cut_value[index]
    }

    fn use_path_for_box(&self) -> bool {
        self.bounding_box_cache_fraction < SWITCH_FRACTION
    }

    fn set_path(&self, answer: &mut Vec<(usize, usize)>, root: usize, point: &[f32]) {
        let mut node = root;
        answer.push((root, NULL_NODE));
        while self.is_internal(node) {
            if self.is_left_of(node, point) {
                answer.push((self.left_index[node].into(), self.right_index[node].into()));
                node = self.left_index[node].into();
            } else {
                answer.push((self.right_index[node].into(), self.left_index[node].into()));
                node = self.right_index[node].into();
            }
        }
    }

    fn null_node(&self) -> usize {
        NULL_NODE
    }
}
