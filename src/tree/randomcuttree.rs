use std::fmt::Debug;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_core::RngCore;

use crate::{
    errors::RCFError,
    pointstore::PointStoreView,
    tree::{
        boundingbox::BoundingBox,
        cut::Cut,
        nodestore::{NodeStoreView, VectorNodeStore, NULL_NODE},
        nodeview::BasicNodeView,
    },
    types::{Location, Result},
    util::check_argument,
    visitor::{
        scalarscorevisitor::ScalarScoreVisitor,
        visitor::{MultiVisitor, Visitor, VisitorInfo},
    },
};

/// The structural columns of a tree, exported for persistence and accepted
/// back for reconstruction. Child columns of unused slots hold the sentinel
/// `capacity`; an absent root is `usize::MAX`.
#[derive(Clone)]
pub struct TreeColumns {
    pub left_index: Vec<usize>,
    pub right_index: Vec<usize>,
    pub cut_dimension: Vec<usize>,
    pub cut_value: Vec<f32>,
    pub root: usize,
}

/// Runtime operations of a tree, independent of its column widths.
pub trait RandomCutTree {
    /// Inserts a `(point, sequence)` sample and, when the sliding window
    /// exceeds `capacity`, evicts the oldest sample. Returns the point-store
    /// indices whose reference counts the coordinator must settle.
    fn update(
        &mut self,
        point_index: usize,
        sequence_index: u64,
        point_store: &dyn PointStoreView,
    ) -> Result<Option<(usize, Option<usize>)>>;
    fn add(
        &mut self,
        point_index: usize,
        sequence_index: u64,
        point_store: &dyn PointStoreView,
    ) -> Result<usize>;
    fn delete(
        &mut self,
        point_index: usize,
        sequence_index: u64,
        point_store: &dyn PointStoreView,
    ) -> Result<usize>;
    fn score(&self, point: &[f32], point_store: &dyn PointStoreView) -> Result<f64>;
    fn generic_score(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        ignore_mass: usize,
        score_seen: fn(usize, usize) -> f64,
        score_unseen: fn(usize, usize) -> f64,
        damp: fn(usize, usize) -> f64,
    ) -> Result<f64>;
    fn score_visitor_traversal(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor_info: &VisitorInfo,
    ) -> Result<f64>;
    fn traverse(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor: &mut dyn Visitor<f64>,
        visitor_info: &VisitorInfo,
    ) -> Result<f64>;
    fn traverse_multi(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor: &mut dyn MultiVisitor<f64>,
        visitor_info: &VisitorInfo,
    ) -> Result<f64>;
    fn bounding_box(
        &self,
        index: usize,
        point_store: &dyn PointStoreView,
    ) -> Result<BoundingBox>;
    fn point_sum(&self, index: usize, point_store: &dyn PointStoreView) -> Result<Vec<f32>>;
    fn resize_cache(&mut self, fraction: f64) -> Result<()>;
    fn mass(&self) -> usize;
    fn node_mass(&self, index: usize) -> usize;
    fn capacity(&self) -> usize;
    fn dimensions(&self) -> usize;
    fn root(&self) -> usize;
    fn is_leaf(&self, index: usize) -> bool;
    fn is_internal(&self, index: usize) -> bool;
    /// The root-to-leaf descent for `point` as `(visited, sibling)` pairs,
    /// starting at `(root, NULL)`.
    fn path_to_leaf(&self, point: &[f32]) -> Vec<(usize, usize)>;
    fn sequence_count(&self, point_index: usize, sequence_index: u64) -> usize;
    fn columns(&self) -> TreeColumns;
    fn get_size(&self) -> usize;
}

#[repr(C)]
pub struct RCFTree<C, P, N>
where
    C: Location,
    usize: From<C>,
    P: Location,
    usize: From<P>,
    N: Location,
    usize: From<N>,
{
    dimensions: usize,
    capacity: usize,
    node_store: VectorNodeStore<C, P, N>,
    random_seed: u64,
    root: usize,
    tree_mass: usize,
}

pub type RCFTreeSmall = RCFTree<u8, u16, u8>;
pub type RCFTreeMedium = RCFTree<u16, usize, u16>;
pub type RCFTreeLarge = RCFTree<usize, usize, usize>;

impl<C, P, N> RCFTree<C, P, N>
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
        dimensions: usize,
        capacity: usize,
        store_parent: bool,
        center_of_mass_enabled: bool,
        store_sequences_enabled: bool,
        bounding_box_cache_fraction: f64,
        random_seed: u64,
    ) -> Result<Self> {
        let node_store = VectorNodeStore::<C, P, N>::new(
            capacity,
            dimensions,
            store_parent,
            center_of_mass_enabled,
            store_sequences_enabled,
            bounding_box_cache_fraction,
        )?;
        Ok(RCFTree {
            dimensions,
            capacity,
            node_store,
            random_seed,
            root: NULL_NODE,
            tree_mass: 0,
        })
    }

    fn from_options(options: &RCFTreeOptions) -> Result<Self> {
        let mut tree = Self::new(
            options.dimensions,
            options.capacity,
            options.store_parent,
            options.center_of_mass_enabled,
            options.store_sequences_enabled,
            options.bounding_box_cache_fraction,
            options.random_seed,
        )?;
        if let Some(columns) = &options.columns {
            tree.tree_mass = tree.node_store.apply_columns(
                &columns.left_index,
                &columns.right_index,
                &columns.cut_dimension,
                &columns.cut_value,
                columns.root,
            )?;
            tree.root = columns.root;
        }
        Ok(tree)
    }

    /// The recursive scoring descent. Returns the probability that the
    /// current subtree induces a new cut for `point`, the accumulated score,
    /// and a flag that is zero only while an ignored duplicate leaf must be
    /// kept out of the threaded bounding box.
    fn score_scalar(
        &self,
        node: usize,
        depth: usize,
        bounding_box: &mut Option<BoundingBox>,
        use_box: bool,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor_info: &VisitorInfo,
    ) -> Result<(f64, f64, usize)> {
        if self.node_store.is_leaf(node) {
            let leaf_point_index = self.node_store.leaf_point_index(node)?;
            let mass = self.node_store.mass(node);
            if use_box {
                let leaf_point = point_store.reference(leaf_point_index);
                *bounding_box = Some(BoundingBox::new(leaf_point, leaf_point));
            }
            if point_store.is_equal(point, leaf_point_index) {
                if mass > visitor_info.ignore_mass {
                    let score = (visitor_info.damp)(mass, self.tree_mass)
                        * (visitor_info.score_seen)(depth, mass);
                    return Ok((0.0, score, 1));
                }
                return Ok((1.0, (visitor_info.score_unseen)(depth, mass), 0));
            }
            return Ok((1.0, (visitor_info.score_unseen)(depth, mass), 1));
        }

        let (cut_dimension, cut_value, left, right) = self.node_store.cut_and_children(node);
        let (next_node, sibling) = if point[cut_dimension] <= cut_value {
            (left, right)
        } else {
            (right, left)
        };
        let (prob, score, ignore_flag) = self.score_scalar(
            next_node,
            depth + 1,
            bounding_box,
            use_box,
            point,
            point_store,
            visitor_info,
        )?;
        if prob == 0.0 {
            return Ok((0.0, score, ignore_flag));
        }
        if use_box {
            if ignore_flag == 1 {
                self.node_store.grow_node_box(
                    bounding_box.as_mut().unwrap(),
                    point_store,
                    node,
                    sibling,
                );
            } else {
                // the visited side holds only the ignored duplicate; its
                // point must stay out of the shadow box
                *bounding_box = Some(self.node_store.bounding_box(sibling, point_store));
            }
        }
        let probability = self.probability_of_cut(node, point, point_store, bounding_box, visitor_info);
        let mass = self.node_store.mass(node);
        let new_score =
            score * (1.0 - probability) + probability * (visitor_info.score_unseen)(depth, mass);
        Ok((probability, new_score, 1))
    }

    fn probability_of_cut(
        &self,
        node: usize,
        point: &[f32],
        point_store: &dyn PointStoreView,
        bounding_box: &Option<BoundingBox>,
        visitor_info: &VisitorInfo,
    ) -> f64 {
        if visitor_info.ignore_mass > 0 {
            if let Some(shadow) = bounding_box {
                return shadow.probability_of_cut(point);
            }
        }
        match self.node_store.cached_probability_of_cut(node, point) {
            Some(probability) => probability,
            None => match bounding_box {
                Some(current) => current.probability_of_cut(point),
                None => self
                    .node_store
                    .bounding_box(node, point_store)
                    .probability_of_cut(point),
            },
        }
    }

    fn dynamic_score(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor_info: &VisitorInfo,
    ) -> Result<f64> {
        if self.root == NULL_NODE {
            return Ok(0.0);
        }
        check_argument(point.len() == self.dimensions, " incorrect point length")?;
        let use_box = self.node_store.use_path_for_box() || visitor_info.ignore_mass > 0;
        let mut bounding_box = None;
        let (_, score, _) = self.score_scalar(
            self.root,
            0,
            &mut bounding_box,
            use_box,
            point,
            point_store,
            visitor_info,
        )?;
        Ok(score)
    }

    pub fn traverse_visitor<R>(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor: &mut dyn Visitor<R>,
        visitor_info: &VisitorInfo,
    ) -> Result<R> {
        check_argument(point.len() == self.dimensions, " incorrect point length")?;
        if self.root == NULL_NODE {
            return Ok(visitor.result(visitor_info));
        }
        let mut node_view = BasicNodeView::new(
            self.root,
            self.node_store.use_path_for_box(),
            visitor.use_shadow_box(),
        );
        node_view.traverse(visitor, visitor_info, point, point_store, &self.node_store)?;
        Ok(visitor.result(visitor_info))
    }

    pub fn traverse_multi_visitor<R>(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor: &mut dyn MultiVisitor<R>,
        visitor_info: &VisitorInfo,
    ) -> Result<R> {
        check_argument(point.len() == self.dimensions, " incorrect point length")?;
        if self.root == NULL_NODE {
            return Ok(visitor.result(visitor_info));
        }
        let mut node_view = BasicNodeView::new(
            self.root,
            self.node_store.use_path_for_box(),
            visitor.use_shadow_box(),
        );
        node_view.traverse_multi(visitor, visitor_info, point, point_store, &self.node_store)?;
        Ok(visitor.result(visitor_info))
    }
}

impl<C, P, N> RandomCutTree for RCFTree<C, P, N>
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
    fn update(
        &mut self,
        point_index: usize,
        sequence_index: u64,
        point_store: &dyn PointStoreView,
    ) -> Result<Option<(usize, Option<usize>)>> {
        let inserted = self.add(point_index, sequence_index, point_store)?;
        if self.tree_mass > self.capacity {
            if !self.node_store.store_sequences() {
                return Err(RCFError::OutOfCapacity {
                    msg: " window full and sequence tracking disabled; evict explicitly",
                });
            }
            let (oldest, evict_point) =
                self.node_store
                    .oldest_sequence()
                    .ok_or(RCFError::InvalidArgument {
                        msg: " no sequence left to evict",
                    })?;
            let evicted = self.delete(evict_point, oldest, point_store)?;
            return Ok(Some((inserted, Some(evicted))));
        }
        Ok(Some((inserted, None)))
    }

    fn add(
        &mut self,
        point_index: usize,
        sequence_index: u64,
        point_store: &dyn PointStoreView,
    ) -> Result<usize> {
        if self.root == NULL_NODE {
            self.root = self.node_store.add_leaf(point_index, sequence_index);
            self.tree_mass = 1;
            return Ok(point_index);
        }

        let point = &point_store.copy(point_index);
        let mut path_to_root = Vec::new();
        self.node_store.set_path(&mut path_to_root, self.root, point);
        let (mut node, mut sibling) = path_to_root.pop().unwrap();

        let leaf_point_index = self.node_store.leaf_point_index(node)?;
        let old_point = &point_store.copy(leaf_point_index);

        self.tree_mass += 1;
        if point.eq(old_point) {
            self.node_store.increase_leaf_mass(node)?;
            self.node_store.add_leaf(leaf_point_index, sequence_index);
            self.node_store
                .manage_ancestors_add(&mut path_to_root, point, point_store, true);
            return Ok(leaf_point_index);
        }

        let mut saved_parent = if !path_to_root.is_empty() {
            path_to_root.last().unwrap().0
        } else {
            NULL_NODE
        };
        let mut saved_node = node;
        let mut current_box = BoundingBox::new(old_point, old_point);
        let mut saved_box = current_box.clone();
        let mut parent_path: Vec<(usize, usize)> = Vec::new();
        let mut rng = ChaCha20Rng::seed_from_u64(self.random_seed);
        self.random_seed = rng.next_u64();

        let mut parent = saved_parent;
        let mut saved_cut = Cut::new(usize::MAX, 0.0);
        /* the loop has to execute once */
        loop {
            let factor: f64 = rng.gen();
            let (new_cut, separation) =
                Cut::random_cut_and_separation(&current_box, factor, point);
            if separation {
                saved_cut = new_cut;
                saved_parent = parent;
                saved_node = node;
                saved_box = current_box.clone();
                parent_path.clear();
            } else {
                parent_path.push((node, sibling));
            }
            check_argument(saved_cut.dimension != usize::MAX, " incorrect state")?;

            if parent == NULL_NODE {
                break;
            }
            self.node_store
                .grow_node_box(&mut current_box, point_store, parent, sibling);
            let (a, b) = path_to_root.pop().unwrap();
            node = a;
            sibling = b;
            parent = if !path_to_root.is_empty() {
                path_to_root.last().unwrap().0
            } else {
                NULL_NODE
            };
        }

        if saved_parent != NULL_NODE {
            while let Some(entry) = parent_path.pop() {
                path_to_root.push(entry);
            }
            check_argument(
                path_to_root.last().unwrap().0 == saved_parent,
                " incorrect state",
            )?;
        } else {
            check_argument(path_to_root.is_empty(), " incorrect state")?;
        }

        let merged_node = self.node_store.add_node(
            saved_parent,
            point,
            saved_node,
            point_index,
            saved_cut,
            &saved_box,
        )?;
        self.node_store.add_leaf(point_index, sequence_index);
        if self.node_store.store_point_sum() {
            self.node_store.recompute_point_sum(merged_node, point_store);
        }
        if saved_parent != NULL_NODE {
            self.node_store
                .manage_ancestors_add(&mut path_to_root, point, point_store, false);
        } else {
            self.root = merged_node;
        }
        Ok(point_index)
    }

    fn delete(
        &mut self,
        point_index: usize,
        sequence_index: u64,
        point_store: &dyn PointStoreView,
    ) -> Result<usize> {
        check_argument(self.root != NULL_NODE, " deleting from an empty tree")?;

        let point = &point_store.copy(point_index);
        let mut leaf_path = Vec::new();
        self.node_store.set_path(&mut leaf_path, self.root, point);
        let (leaf_node, leaf_saved_sibling) = leaf_path.pop().unwrap();

        let leaf_point_index = self.node_store.leaf_point_index(leaf_node)?;
        if leaf_point_index != point_index && !point_store.is_equal(point, leaf_point_index) {
            return Err(RCFError::InvalidArgument {
                msg: " deleting wrong node",
            });
        }

        self.node_store.remove_leaf(leaf_point_index, sequence_index)?;
        self.tree_mass -= 1;

        if self.node_store.decrease_leaf_mass(leaf_node)? == 0 {
            if leaf_path.is_empty() {
                self.root = NULL_NODE;
            } else {
                let (parent, _sibling) = leaf_path.pop().unwrap();
                let grand_parent = if leaf_path.is_empty() {
                    NULL_NODE
                } else {
                    leaf_path.last().unwrap().0
                };

                if grand_parent == NULL_NODE {
                    self.root = leaf_saved_sibling;
                    self.node_store.set_root(self.root);
                } else {
                    self.node_store
                        .replace_node(grand_parent, parent, leaf_saved_sibling);
                    self.node_store
                        .manage_ancestors_delete(&mut leaf_path, point, point_store, false);
                }
                self.node_store.delete_internal_node(parent)?;
            }
        } else {
            self.node_store
                .manage_ancestors_delete(&mut leaf_path, point, point_store, true);
        }
        Ok(leaf_point_index)
    }

    fn score(&self, point: &[f32], point_store: &dyn PointStoreView) -> Result<f64> {
        self.dynamic_score(point, point_store, &VisitorInfo::default())
    }

    fn generic_score(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        ignore_mass: usize,
        score_seen: fn(usize, usize) -> f64,
        score_unseen: fn(usize, usize) -> f64,
        damp: fn(usize, usize) -> f64,
    ) -> Result<f64> {
        self.dynamic_score(
            point,
            point_store,
            &VisitorInfo::use_score(ignore_mass, score_seen, score_unseen, damp),
        )
    }

    fn score_visitor_traversal(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor_info: &VisitorInfo,
    ) -> Result<f64> {
        let mut visitor = ScalarScoreVisitor::new(self.tree_mass, visitor_info.ignore_mass);
        self.traverse_visitor(point, point_store, &mut visitor, visitor_info)
    }

    fn traverse(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor: &mut dyn Visitor<f64>,
        visitor_info: &VisitorInfo,
    ) -> Result<f64> {
        self.traverse_visitor(point, point_store, visitor, visitor_info)
    }

    fn traverse_multi(
        &self,
        point: &[f32],
        point_store: &dyn PointStoreView,
        visitor: &mut dyn MultiVisitor<f64>,
        visitor_info: &VisitorInfo,
    ) -> Result<f64> {
        self.traverse_multi_visitor(point, point_store, visitor, visitor_info)
    }

    fn bounding_box(
        &self,
        index: usize,
        point_store: &dyn PointStoreView,
    ) -> Result<BoundingBox> {
        check_argument(
            self.node_store.is_leaf(index) || self.node_store.is_internal(index),
            " index is not a node",
        )?;
        Ok(self.node_store.bounding_box(index, point_store))
    }

    fn point_sum(&self, index: usize, point_store: &dyn PointStoreView) -> Result<Vec<f32>> {
        check_argument(self.node_store.store_point_sum(), " center of mass is disabled")?;
        check_argument(
            self.node_store.is_leaf(index) || self.node_store.is_internal(index),
            " index is not a node",
        )?;
        Ok(self.node_store.point_sum(index, point_store))
    }

    fn resize_cache(&mut self, fraction: f64) -> Result<()> {
        self.node_store.resize_cache(fraction)
    }

    fn mass(&self) -> usize {
        self.tree_mass
    }

    fn node_mass(&self, index: usize) -> usize {
        self.node_store.mass(index)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn root(&self) -> usize {
        self.root
    }

    fn is_leaf(&self, index: usize) -> bool {
        self.node_store.is_leaf(index)
    }

    fn is_internal(&self, index: usize) -> bool {
        self.node_store.is_internal(index)
    }

    fn path_to_leaf(&self, point: &[f32]) -> Vec<(usize, usize)> {
        let mut path = Vec::new();
        if self.root != NULL_NODE {
            self.node_store.set_path(&mut path, self.root, point);
        }
        path
    }

    fn sequence_count(&self, point_index: usize, sequence_index: u64) -> usize {
        self.node_store.sequence_count(point_index, sequence_index)
    }

    fn columns(&self) -> TreeColumns {
        let (left_index, right_index, cut_dimension, cut_value) =
            self.node_store.export_columns();
        TreeColumns {
            left_index,
            right_index,
            cut_dimension,
            cut_value,
            root: self.root,
        }
    }

    fn get_size(&self) -> usize {
        self.node_store.get_size() + std::mem::size_of::<RCFTree<C, P, N>>()
    }
}

/// Construction options of a tree; `build` validates the cross-field
/// constraints and selects the narrowest column layout the capacity and
/// dimensions permit (thresholds 256 and 65535).
pub struct RCFTreeOptions {
    dimensions: usize,
    capacity: usize,
    bounding_box_cache_fraction: f64,
    center_of_mass_enabled: bool,
    store_sequences_enabled: bool,
    store_parent: bool,
    random_seed: u64,
    columns: Option<TreeColumns>,
}

impl RCFTreeOptions {
    pub fn new(dimensions: usize, capacity: usize) -> Self {
        RCFTreeOptions {
            dimensions,
            capacity,
            bounding_box_cache_fraction: 1.0,
            center_of_mass_enabled: false,
            store_sequences_enabled: false,
            store_parent: false,
            random_seed: 42,
            columns: None,
        }
    }

    pub fn bounding_box_cache_fraction(mut self, fraction: f64) -> Self {
        self.bounding_box_cache_fraction = fraction;
        self
    }

    pub fn center_of_mass_enabled(mut self, enabled: bool) -> Self {
        self.center_of_mass_enabled = enabled;
        self
    }

    pub fn store_sequences_enabled(mut self, enabled: bool) -> Self {
        self.store_sequences_enabled = enabled;
        self
    }

    pub fn store_parent(mut self, enabled: bool) -> Self {
        self.store_parent = enabled;
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn columns(mut self, columns: TreeColumns) -> Self {
        self.columns = Some(columns);
        self
    }

    /// The point-store view is required; construction fails when its
    /// dimensions disagree with the options.
    pub fn build(&self, point_store: &dyn PointStoreView) -> Result<Box<dyn RandomCutTree>> {
        check_argument(
            point_store.dimensions() == self.dimensions,
            " point store dimensions mismatch",
        )?;
        if self.capacity < 256 && self.dimensions <= 256 {
            Ok(Box::new(RCFTreeSmall::from_options(self)?))
        } else if self.capacity < 65535 && self.dimensions <= 65535 {
            Ok(Box::new(RCFTreeMedium::from_options(self)?))
        } else {
            Ok(Box::new(RCFTreeLarge::from_options(self)?))
        }
    }
}
