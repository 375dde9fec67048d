use crate::{
    pointstore::PointStoreView,
    tree::{boundingbox::BoundingBox, nodestore::NodeStoreView},
    types::Result,
    visitor::visitor::{MultiVisitor, Visitor, VisitorInfo},
};

/// Read-only cursor over the node a traversal currently sits on. The
/// traversal mutates the view in place; visitors observe it through this
/// trait and must not retain it.
pub trait NodeView {
    fn mass(&self) -> usize;
    fn depth(&self) -> usize;
    fn bounding_box(&self) -> BoundingBox;
    fn shadow_box(&self) -> BoundingBox;
    fn probability_of_cut(&self, point: &[f32]) -> f64;
    fn leaf_equals(&self) -> bool;
    fn leaf_index(&self) -> usize;
    fn cut_dimension(&self) -> usize;
    fn cut_value(&self) -> f32;
}

pub struct BasicNodeView {
    current_node: usize,
    current_box: Option<BoundingBox>,
    shadow_box: Option<BoundingBox>,
    shadow_box_set: bool,
    use_box_for_accept: bool,
    maintain_shadow_box: bool,
    leaf_index: usize,
    leaf_duplicate: bool,
    probability_of_cut: f64,
    cut_dimension: usize,
    cut_value: f32,
    left_child: usize,
    right_child: usize,
    mass: usize,
    depth: usize,
}

impl BasicNodeView {
    pub fn new(root: usize, use_box_for_accept: bool, maintain_shadow_box: bool) -> Self {
        BasicNodeView {
            current_node: root,
            current_box: None,
            shadow_box: None,
            shadow_box_set: false,
            use_box_for_accept,
            maintain_shadow_box,
            leaf_index: usize::MAX,
            leaf_duplicate: false,
            probability_of_cut: 1.0,
            cut_dimension: usize::MAX,
            cut_value: 0.0,
            left_child: usize::MAX,
            right_child: usize::MAX,
            mass: 0,
            depth: 0,
        }
    }

    fn set_leaf_view(
        &mut self,
        point: &[f32],
        visitor_info: &VisitorInfo,
        point_store: &dyn PointStoreView,
        node_store: &dyn NodeStoreView,
    ) -> Result<()> {
        self.leaf_index = node_store.leaf_point_index(self.current_node)?;
        self.leaf_duplicate = point_store.is_equal(point, self.leaf_index);
        self.mass = node_store.mass(self.current_node);
        let leaf_point = point_store.reference(self.leaf_index);
        if self.use_box_for_accept {
            self.current_box = Some(BoundingBox::new(leaf_point, leaf_point));
        }
        // only a duplicate at or below the ignore threshold stays out of
        // the shadow box; any other leaf seeds it
        if self.maintain_shadow_box
            && !(self.leaf_duplicate && self.mass <= visitor_info.ignore_mass)
        {
            self.shadow_box = Some(BoundingBox::new(leaf_point, leaf_point));
            self.shadow_box_set = true;
        }
        Ok(())
    }

    fn update_view_for_path(&mut self, node_store: &dyn NodeStoreView) {
        let (dimension, value, left, right) = node_store.cut_and_children(self.current_node);
        self.cut_dimension = dimension;
        self.cut_value = value;
        self.left_child = left;
        self.right_child = right;
    }

    fn update_view_to_child(&mut self, point: &[f32]) {
        self.depth += 1;
        self.current_node = if point[self.cut_dimension] <= self.cut_value {
            self.left_child
        } else {
            self.right_child
        };
    }

    fn update_view_to_parent(
        &mut self,
        parent: usize,
        point: &[f32],
        point_store: &dyn PointStoreView,
        node_store: &dyn NodeStoreView,
    ) {
        let past_node = self.current_node;
        self.current_node = parent;
        self.update_view_for_path(node_store);
        let sibling = if past_node == self.left_child {
            self.right_child
        } else {
            self.left_child
        };

        if self.maintain_shadow_box {
            // unset here means the descended leaf was an ignored duplicate;
            // the shadow starts over from the sibling without it
            if !self.shadow_box_set {
                self.shadow_box = Some(node_store.bounding_box(sibling, point_store));
                self.shadow_box_set = true;
            } else {
                node_store.grow_node_box(
                    self.shadow_box.as_mut().unwrap(),
                    point_store,
                    parent,
                    sibling,
                );
            }
            if self.use_box_for_accept {
                let shadow = self.shadow_box.as_ref().unwrap().clone();
                let current = self.current_box.as_mut().unwrap();
                current.add_box(&shadow);
                self.probability_of_cut = current.probability_of_cut(point);
            } else {
                self.probability_of_cut =
                    node_store.probability_of_cut(parent, point, point_store);
            }
        } else if self.use_box_for_accept {
            let current = self.current_box.as_mut().unwrap();
            node_store.grow_node_box(current, point_store, parent, sibling);
            self.probability_of_cut = current.probability_of_cut(point);
        } else {
            self.probability_of_cut = node_store.probability_of_cut(parent, point, point_store);
        }

        self.depth -= 1;
        self.mass = node_store.mass(parent);
    }

    /// Single-visitor descent: follow the cut to the leaf, then unwind
    /// calling `accept` per internal node until the visitor converges.
    pub fn traverse<R>(
        &mut self,
        visitor: &mut dyn Visitor<R>,
        visitor_info: &VisitorInfo,
        point: &[f32],
        point_store: &dyn PointStoreView,
        node_store: &dyn NodeStoreView,
    ) -> Result<()> {
        if node_store.is_leaf(self.current_node) {
            self.set_leaf_view(point, visitor_info, point_store, node_store)?;
            visitor.accept_leaf(point, visitor_info, self);
        } else {
            let saved = self.current_node;
            self.update_view_for_path(node_store);
            self.update_view_to_child(point);
            self.traverse(visitor, visitor_info, point, point_store, node_store)?;
            if !visitor.is_converged() {
                self.update_view_to_parent(saved, point, point_store, node_store);
                visitor.accept(point, visitor_info, self);
            }
        }
        Ok(())
    }

    /// Multi-visitor descent: when `trigger` fires at an internal node, the
    /// left branch keeps the visitor, the right branch gets a fresh copy,
    /// and the copies merge on the way back up.
    pub fn traverse_multi<R>(
        &mut self,
        visitor: &mut dyn MultiVisitor<R>,
        visitor_info: &VisitorInfo,
        point: &[f32],
        point_store: &dyn PointStoreView,
        node_store: &dyn NodeStoreView,
    ) -> Result<()> {
        if node_store.is_leaf(self.current_node) {
            self.set_leaf_view(point, visitor_info, point_store, node_store)?;
            visitor.accept_leaf(point, visitor_info, self);
        } else {
            let parent = self.current_node;
            self.update_view_for_path(node_store);
            if visitor.trigger(visitor_info, self) {
                let (left, right) = (self.left_child, self.right_child);
                self.depth += 1;
                self.current_node = left;
                self.traverse_multi(visitor, visitor_info, point, point_store, node_store)?;
                let saved_box = self.current_box.take();
                let mut right_visitor = visitor.new_copy();
                self.current_node = right;
                self.traverse_multi(
                    right_visitor.as_mut(),
                    visitor_info,
                    point,
                    point_store,
                    node_store,
                )?;
                visitor.combine(right_visitor, visitor_info);
                self.depth -= 1;
                self.current_node = parent;
                self.update_view_for_path(node_store);
                if self.use_box_for_accept {
                    let current = self.current_box.as_mut().unwrap();
                    if let Some(saved) = saved_box {
                        current.add_box(&saved);
                    }
                    self.probability_of_cut = current.probability_of_cut(point);
                } else {
                    self.probability_of_cut =
                        node_store.probability_of_cut(parent, point, point_store);
                }
                self.mass = node_store.mass(parent);
                if !visitor.is_converged() {
                    visitor.accept(point, visitor_info, self);
                }
            } else {
                self.update_view_to_child(point);
                self.traverse_multi(visitor, visitor_info, point, point_store, node_store)?;
                if !visitor.is_converged() {
                    self.update_view_to_parent(parent, point, point_store, node_store);
                    visitor.accept(point, visitor_info, self);
                }
            }
        }
        Ok(())
    }
}

impl NodeView for BasicNodeView {
    fn mass(&self) -> usize {
        self.mass
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn bounding_box(&self) -> BoundingBox {
        match &self.current_box {
            Some(bounding_box) => bounding_box.clone(),
            None => panic!(" traversal does not maintain a box"),
        }
    }

    fn shadow_box(&self) -> BoundingBox {
        match &self.shadow_box {
            Some(bounding_box) => bounding_box.clone(),
            None => panic!(" traversal does not maintain a shadow box"),
        }
    }

    fn probability_of_cut(&self, _point: &[f32]) -> f64 {
        self.probability_of_cut
    }

    fn leaf_equals(&self) -> bool {
        self.leaf_duplicate
    }

    fn leaf_index(&self) -> usize {
        self.leaf_index
    }

    fn cut_dimension(&self) -> usize {
        self.cut_dimension
    }

    fn cut_value(&self) -> f32 {
        self.cut_value
    }
}
