use crate::{
    tree::nodeview::NodeView,
    visitor::visitor::{Visitor, VisitorInfo},
};

/// Accumulates the standard anomaly score along a descent. A duplicate leaf
/// above the ignore threshold converges the traversal with a damped "seen"
/// score; otherwise each internal node mixes the child score with the
/// unseen score by its probability of cut.
pub struct ScalarScoreVisitor {
    tree_mass: usize,
    ignore_mass: usize,
    converged: bool,
    score: f64,
}

impl ScalarScoreVisitor {
    pub fn new(tree_mass: usize, ignore_mass: usize) -> Self {
        ScalarScoreVisitor {
            tree_mass,
            ignore_mass,
            converged: false,
            score: 0.0,
        }
    }
}

impl Visitor<f64> for ScalarScoreVisitor {
    fn accept_leaf(&mut self, _point: &[f32], visitor_info: &VisitorInfo, node_view: &dyn NodeView) {
        let mass = node_view.mass();
        if node_view.leaf_equals() && mass > visitor_info.ignore_mass {
            self.score = (visitor_info.damp)(mass, self.tree_mass)
                * (visitor_info.score_seen)(node_view.depth(), mass);
            self.converged = true;
        } else {
            self.score = (visitor_info.score_unseen)(node_view.depth(), mass);
        }
    }

    fn accept(&mut self, point: &[f32], visitor_info: &VisitorInfo, node_view: &dyn NodeView) {
        if !self.converged {
            let prob = if visitor_info.ignore_mass == 0 {
                node_view.probability_of_cut(point)
            } else {
                node_view.shadow_box().probability_of_cut(point)
            };
            if prob == 0.0 {
                self.converged = true;
            } else {
                self.score = (1.0 - prob) * self.score
                    + prob * (visitor_info.score_unseen)(node_view.depth(), node_view.mass());
            }
        }
    }

    fn result(&self, _visitor_info: &VisitorInfo) -> f64 {
        self.score
    }

    fn is_converged(&self) -> bool {
        self.converged
    }

    fn use_shadow_box(&self) -> bool {
        self.ignore_mass > 0
    }
}
