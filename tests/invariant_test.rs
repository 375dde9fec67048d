extern crate rand;
extern crate rand_chacha;
extern crate rcftree;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rcftree::{
    NodeView, PointStoreView, RCFError, RCFTreeOptions, RandomCutTree, TreeColumns,
    VectorizedPointStore, Visitor, VisitorInfo, MultiVisitor,
};

fn random_points(rng: &mut ChaCha20Rng, count: usize, dimensions: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|_| (0..dimensions).map(|_| rng.gen::<f32>() * 10.0 - 5.0).collect())
        .collect()
}

struct SubtreeSummary {
    mass: usize,
    min: Vec<f32>,
    max: Vec<f32>,
}

/// Recomputes mass and the tight box of every subtree from scratch and
/// checks them against the tree's own answers, and checks that every leaf
/// sits on the correct side of each ancestor cut.
fn check_subtree(
    tree: &dyn RandomCutTree,
    store: &VectorizedPointStore,
    columns: &TreeColumns,
    node: usize,
) -> SubtreeSummary {
    if tree.is_leaf(node) {
        let point = store.reference(node - tree.capacity() - 1).to_vec();
        return SubtreeSummary {
            mass: tree.node_mass(node),
            min: point.clone(),
            max: point,
        };
    }
    assert!(tree.is_internal(node));
    let left = check_subtree(tree, store, columns, columns.left_index[node]);
    let right = check_subtree(tree, store, columns, columns.right_index[node]);

    let dimension = columns.cut_dimension[node];
    let value = columns.cut_value[node];
    assert!(left.max[dimension] <= value, "left subtree crosses the cut");
    assert!(right.min[dimension] > value, "right subtree crosses the cut");

    let mass = left.mass + right.mass;
    assert_eq!(tree.node_mass(node), mass, "inconsistent node mass");

    let min: Vec<f32> = left
        .min
        .iter()
        .zip(&right.min)
        .map(|(a, b)| a.min(*b))
        .collect();
    let max: Vec<f32> = left
        .max
        .iter()
        .zip(&right.max)
        .map(|(a, b)| a.max(*b))
        .collect();
    let bounding_box = tree.bounding_box(node, store).unwrap();
    assert_eq!(bounding_box.get_min_values(), &min[..], "box is not tight");
    assert_eq!(bounding_box.get_max_values(), &max[..], "box is not tight");

    SubtreeSummary { mass, min, max }
}

fn check_tree(tree: &dyn RandomCutTree, store: &VectorizedPointStore) {
    let root = tree.root();
    if root == usize::MAX {
        assert_eq!(tree.mass(), 0);
        return;
    }
    let columns = tree.columns();
    let summary = check_subtree(tree, store, &columns, root);
    assert_eq!(summary.mass, tree.mass());
}

#[test]
fn sliding_window_stream() {
    let capacity = 64;
    let dimensions = 3;
    let mut rng = ChaCha20Rng::seed_from_u64(4242);
    let mut store = VectorizedPointStore::new(dimensions, 4 * capacity).unwrap();
    let mut tree = RCFTreeOptions::new(dimensions, capacity)
        .store_sequences_enabled(true)
        .bounding_box_cache_fraction(0.75)
        .random_seed(rng.gen())
        .build(&store)
        .unwrap();

    let points = random_points(&mut rng, 300, dimensions);
    for (sequence, point) in points.iter().enumerate() {
        let index = store.add(point).unwrap();
        let result = tree.update(index, sequence as u64, &store).unwrap();
        let (_, evicted) = result.unwrap();
        assert_eq!(evicted.is_some(), sequence >= capacity);
        store.adjust_count(&[result]).unwrap();
        store.dec(index).unwrap();

        assert_eq!(tree.mass(), (sequence + 1).min(capacity));
        if (sequence + 1) % 50 == 0 {
            check_tree(tree.as_ref(), &store);
            // one live reference per leaf occurrence
            let columns = tree.columns();
            let mut leaves = 0;
            for slot in 0..capacity {
                for child in [columns.left_index[slot], columns.right_index[slot]] {
                    if tree.is_leaf(child) {
                        leaves += 1;
                    }
                }
            }
            if tree.is_leaf(tree.root()) {
                leaves += 1;
            }
            assert_eq!(store.size(), leaves);
        }
    }
}

#[test]
fn interleaved_insert_delete() {
    let capacity = 32;
    let dimensions = 2;
    let mut rng = ChaCha20Rng::seed_from_u64(77);
    let mut store = VectorizedPointStore::new(dimensions, 4 * capacity).unwrap();
    let mut tree = RCFTreeOptions::new(dimensions, capacity)
        .store_sequences_enabled(true)
        .bounding_box_cache_fraction(0.3)
        .random_seed(rng.gen())
        .build(&store)
        .unwrap();

    let mut live: Vec<(u64, usize)> = Vec::new();
    for sequence in 0..400u64 {
        if sequence % 3 == 2 && live.len() > 1 {
            let pick = rng.gen_range(0..live.len());
            let (old_sequence, point_index) = live.swap_remove(pick);
            tree.delete(point_index, old_sequence, &store).unwrap();
            store.dec(point_index).unwrap();
        } else if live.len() < capacity {
            let point: Vec<f32> = (0..dimensions).map(|_| rng.gen::<f32>() * 4.0).collect();
            let index = store.add(&point).unwrap();
            tree.add(index, sequence, &store).unwrap();
            live.push((sequence, index));
        }
        if sequence % 40 == 39 {
            check_tree(tree.as_ref(), &store);
        }
    }
    assert_eq!(tree.mass(), live.len());
}

#[test]
fn insert_delete_idempotence() {
    let capacity = 32;
    let dimensions = 2;
    let mut rng = ChaCha20Rng::seed_from_u64(1001);
    let mut store = VectorizedPointStore::new(dimensions, 4 * capacity).unwrap();
    let mut tree = RCFTreeOptions::new(dimensions, capacity)
        .store_sequences_enabled(true)
        .center_of_mass_enabled(true)
        .random_seed(rng.gen())
        .build(&store)
        .unwrap();

    for sequence in 0..20u64 {
        let point: Vec<f32> = (0..dimensions).map(|_| rng.gen::<f32>()).collect();
        let index = store.add(&point).unwrap();
        tree.add(index, sequence, &store).unwrap();
    }

    let queries = random_points(&mut rng, 5, dimensions);
    let before_columns = tree.columns();
    let before_mass = tree.mass();
    let before_sum = tree.point_sum(tree.root(), &store).unwrap();
    let before_scores: Vec<f64> = queries
        .iter()
        .map(|q| tree.score(q, &store).unwrap())
        .collect();

    let extra = store.add(&[9.5, -9.5]).unwrap();
    tree.add(extra, 100, &store).unwrap();
    assert_eq!(tree.sequence_count(extra, 100), 1);
    tree.delete(extra, 100, &store).unwrap();
    store.dec(extra).unwrap();
    assert_eq!(tree.sequence_count(extra, 100), 0);

    let after_columns = tree.columns();
    assert_eq!(before_columns.left_index, after_columns.left_index);
    assert_eq!(before_columns.right_index, after_columns.right_index);
    assert_eq!(before_columns.cut_value, after_columns.cut_value);
    assert_eq!(before_columns.root, after_columns.root);
    assert_eq!(tree.mass(), before_mass);
    assert_eq!(tree.point_sum(tree.root(), &store).unwrap(), before_sum);
    for (query, before) in queries.iter().zip(&before_scores) {
        let after = tree.score(query, &store).unwrap();
        assert!((before - after).abs() < 1e-12);
    }
}

#[test]
fn column_round_trip() {
    let capacity = 32;
    let dimensions = 3;
    let mut rng = ChaCha20Rng::seed_from_u64(2024);
    let mut store = VectorizedPointStore::new(dimensions, 4 * capacity).unwrap();
    let mut tree = RCFTreeOptions::new(dimensions, capacity)
        .random_seed(rng.gen())
        .build(&store)
        .unwrap();
    for sequence in 0..30u64 {
        let point: Vec<f32> = (0..dimensions).map(|_| rng.gen::<f32>() * 8.0).collect();
        let index = store.add(&point).unwrap();
        tree.add(index, sequence, &store).unwrap();
    }

    let rebuilt = RCFTreeOptions::new(dimensions, capacity)
        .columns(tree.columns())
        .build(&store)
        .unwrap();
    assert_eq!(rebuilt.mass(), tree.mass());

    for query in random_points(&mut rng, 10, dimensions) {
        let a = tree.score(&query, &store).unwrap();
        let b = rebuilt.score(&query, &store).unwrap();
        assert!((a - b).abs() < 1e-9, "round trip changed the score");
    }
    check_tree(rebuilt.as_ref(), &store);
}

#[test]
fn score_is_nonnegative() {
    let capacity = 64;
    let dimensions = 2;
    let mut rng = ChaCha20Rng::seed_from_u64(555);
    let mut store = VectorizedPointStore::new(dimensions, 4 * capacity).unwrap();
    let mut tree = RCFTreeOptions::new(dimensions, capacity)
        .store_sequences_enabled(true)
        .random_seed(rng.gen())
        .build(&store)
        .unwrap();
    for (sequence, point) in random_points(&mut rng, capacity, dimensions)
        .iter()
        .enumerate()
    {
        let index = store.add(point).unwrap();
        tree.add(index, sequence as u64, &store).unwrap();
    }
    for query in random_points(&mut rng, 50, dimensions) {
        assert!(tree.score(&query, &store).unwrap() >= 0.0);
    }
}

#[test]
fn missing_sequence_is_fatal() {
    let mut store = VectorizedPointStore::new(2, 8).unwrap();
    let mut tree = RCFTreeOptions::new(2, 4)
        .store_sequences_enabled(true)
        .build(&store)
        .unwrap();
    let index = store.add(&[1.0, 2.0]).unwrap();
    tree.add(index, 0, &store).unwrap();
    let error = tree.delete(index, 5, &store).unwrap_err();
    assert!(matches!(error, RCFError::MissingLeaf { .. }));
}

#[test]
fn window_overflow_without_sequences() {
    let mut store = VectorizedPointStore::new(1, 8).unwrap();
    let mut tree = RCFTreeOptions::new(1, 2).build(&store).unwrap();
    for value in [1.0f32, 2.0] {
        let index = store.add(&[value]).unwrap();
        tree.update(index, 0, &store).unwrap();
    }
    let index = store.add(&[3.0]).unwrap();
    let error = tree.update(index, 0, &store).unwrap_err();
    assert!(matches!(error, RCFError::OutOfCapacity { .. }));
}

struct MassCounter {
    total: f64,
}

impl Visitor<f64> for MassCounter {
    fn accept(&mut self, _point: &[f32], _info: &VisitorInfo, _view: &dyn NodeView) {}

    fn accept_leaf(&mut self, _point: &[f32], _info: &VisitorInfo, view: &dyn NodeView) {
        self.total += view.mass() as f64;
    }

    fn is_converged(&self) -> bool {
        false
    }

    fn result(&self, _info: &VisitorInfo) -> f64 {
        self.total
    }
}

impl MultiVisitor<f64> for MassCounter {
    fn trigger(&self, _info: &VisitorInfo, _view: &dyn NodeView) -> bool {
        true
    }

    fn new_copy(&self) -> Box<dyn MultiVisitor<f64>> {
        Box::new(MassCounter { total: 0.0 })
    }

    fn combine(&mut self, other: Box<dyn MultiVisitor<f64>>, info: &VisitorInfo) {
        self.total += other.result(info);
    }
}

#[test]
fn multi_visitor_covers_both_branches() {
    let capacity = 16;
    let dimensions = 2;
    let mut rng = ChaCha20Rng::seed_from_u64(9);
    let mut store = VectorizedPointStore::new(dimensions, 64).unwrap();
    let mut tree = RCFTreeOptions::new(dimensions, capacity)
        .random_seed(rng.gen())
        .build(&store)
        .unwrap();
    for (sequence, point) in random_points(&mut rng, capacity, dimensions)
        .iter()
        .enumerate()
    {
        let index = store.add(point).unwrap();
        tree.add(index, sequence as u64, &store).unwrap();
    }

    let mut visitor = MassCounter { total: 0.0 };
    let total = tree
        .traverse_multi(&[0.0, 0.0], &store, &mut visitor, &VisitorInfo::default())
        .unwrap();
    assert_eq!(total, tree.mass() as f64);
}
