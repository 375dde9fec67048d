extern crate rcftree;

use rcftree::{
    RCFTreeLarge, RCFTreeOptions, RCFTreeSmall, RandomCutTree, VectorizedPointStore,
};

fn score_seen(depth: usize, mass: usize) -> f64 {
    1.0 / (depth as f64 + f64::log2(1.0 + mass as f64))
}

fn score_unseen(depth: usize, _mass: usize) -> f64 {
    1.0 / (depth as f64 + 1.0)
}

fn full_damp(mass: usize, tree_mass: usize) -> f64 {
    1.0 - (mass as f64) / (tree_mass as f64)
}

#[test]
fn split_then_delete_restores_box() {
    let mut store = VectorizedPointStore::new(2, 8).unwrap();
    let mut tree = RCFTreeOptions::new(2, 2)
        .store_sequences_enabled(true)
        .random_seed(11)
        .build(&store)
        .unwrap();

    let a = store.add(&[1.0, 1.0]).unwrap();
    let b = store.add(&[-1.0, -1.0]).unwrap();
    let c = store.add(&[3.0, 3.0]).unwrap();
    tree.add(a, 0, &store).unwrap();
    tree.add(b, 1, &store).unwrap();
    tree.add(c, 2, &store).unwrap();

    let root = tree.root();
    assert!(tree.is_internal(root));
    let columns = tree.columns();
    let sentinel = tree.capacity();
    assert!(columns.left_index[root] != sentinel);
    assert!(columns.right_index[root] != sentinel);

    let bounding_box = tree.bounding_box(root, &store).unwrap();
    assert_eq!(bounding_box.get_min_values(), &[-1.0, -1.0]);
    assert_eq!(bounding_box.get_max_values(), &[3.0, 3.0]);

    tree.delete(c, 2, &store).unwrap();
    let bounding_box = tree.bounding_box(tree.root(), &store).unwrap();
    assert_eq!(bounding_box.get_min_values(), &[-1.0, -1.0]);
    assert_eq!(bounding_box.get_max_values(), &[1.0, 1.0]);
}

#[test]
fn duplicate_leaf_mass_and_ignore_threshold() {
    let mut store = VectorizedPointStore::new(2, 8).unwrap();
    let capacity = 4;
    let mut tree = RCFTreeOptions::new(2, capacity)
        .store_sequences_enabled(true)
        .random_seed(7)
        .build(&store)
        .unwrap();

    let first = store.add(&[0.0, 0.0]).unwrap();
    let second = store.add(&[0.0, 0.0]).unwrap();
    tree.add(first, 0, &store).unwrap();
    // a duplicate folds into the existing leaf and returns its point index
    let merged = tree.add(second, 1, &store).unwrap();
    assert_eq!(merged, first);

    let leaf_index = capacity + 1 + first;
    assert_eq!(tree.node_mass(leaf_index), 2);
    assert_eq!(tree.mass(), 2);

    let seen = tree
        .generic_score(&[0.0, 0.0], &store, 0, score_seen, score_unseen, full_damp)
        .unwrap();
    assert_eq!(seen, 0.0);

    let ignored = tree
        .generic_score(&[0.0, 0.0], &store, 2, score_seen, score_unseen, full_damp)
        .unwrap();
    assert!(ignored > 0.0);
}

#[test]
fn score_agrees_without_cache() {
    let values = [1.0f32, 2.0, 3.0, 4.0];
    let mut scores = Vec::new();
    for fraction in [0.0, 1.0] {
        let mut store = VectorizedPointStore::new(1, 8).unwrap();
        let mut tree = RCFTreeOptions::new(1, 4)
            .bounding_box_cache_fraction(fraction)
            .random_seed(99)
            .build(&store)
            .unwrap();
        for (sequence, value) in values.iter().enumerate() {
            let index = store.add(&[*value]).unwrap();
            tree.add(index, sequence as u64, &store).unwrap();
        }
        scores.push(tree.score(&[100.0], &store).unwrap());
    }
    assert!((scores[0] - scores[1]).abs() < 1e-6);
}

#[test]
fn width_layouts_agree() {
    let dimensions = 256;
    let capacity = 255;
    let mut store = VectorizedPointStore::new(dimensions, 64).unwrap();
    let mut small =
        RCFTreeSmall::new(dimensions, capacity, false, false, true, 1.0, 13).unwrap();
    let mut large =
        RCFTreeLarge::new(dimensions, capacity, false, false, true, 1.0, 13).unwrap();

    for sequence in 0..40u64 {
        let point: Vec<f32> = (0..dimensions)
            .map(|d| ((sequence as f32) * 0.37 + d as f32 * 0.001).sin())
            .collect();
        let index = store.add(&point).unwrap();
        small.add(index, sequence, &store).unwrap();
        large.add(index, sequence, &store).unwrap();
    }

    let small_columns = small.columns();
    let large_columns = large.columns();
    assert_eq!(small_columns.left_index, large_columns.left_index);
    assert_eq!(small_columns.right_index, large_columns.right_index);
    assert_eq!(small_columns.cut_value, large_columns.cut_value);
    assert_eq!(small_columns.root, large_columns.root);

    let query: Vec<f32> = (0..dimensions).map(|d| 2.0 + d as f32 * 0.01).collect();
    let a = small.score(&query, &store).unwrap();
    let b = large.score(&query, &store).unwrap();
    assert!((a - b).abs() < 1e-9);
}

#[test]
fn cache_resize_preserves_scores() {
    let mut store = VectorizedPointStore::new(3, 128).unwrap();
    let mut tree = RCFTreeOptions::new(3, 32)
        .store_sequences_enabled(true)
        .random_seed(31)
        .build(&store)
        .unwrap();
    for sequence in 0..32u64 {
        let point = vec![
            (sequence as f32 * 0.7).sin(),
            (sequence as f32 * 0.3).cos(),
            sequence as f32 * 0.05,
        ];
        let index = store.add(&point).unwrap();
        tree.add(index, sequence, &store).unwrap();
    }

    let query = [0.4f32, -0.2, 5.0];
    let before = tree.score(&query, &store).unwrap();
    tree.resize_cache(0.0).unwrap();
    tree.resize_cache(1.0).unwrap();
    let after = tree.score(&query, &store).unwrap();
    assert!((before - after).abs() < 1e-6);
}

#[test]
fn path_follows_cuts() {
    let mut store = VectorizedPointStore::new(2, 64).unwrap();
    let mut tree = RCFTreeOptions::new(2, 16)
        .random_seed(5)
        .build(&store)
        .unwrap();
    for sequence in 0..16u64 {
        let point = vec![(sequence as f32 * 1.3).sin(), (sequence as f32 * 0.9).cos()];
        let index = store.add(&point).unwrap();
        tree.add(index, sequence, &store).unwrap();
    }

    let query = [0.1f32, 0.8];
    let path = tree.path_to_leaf(&query);
    let columns = tree.columns();
    assert_eq!(path[0].0, tree.root());
    for step in 0..path.len() - 1 {
        let (node, _) = path[step];
        assert!(tree.is_internal(node));
        let expected = if query[columns.cut_dimension[node]] <= columns.cut_value[node] {
            (columns.left_index[node], columns.right_index[node])
        } else {
            (columns.right_index[node], columns.left_index[node])
        };
        assert_eq!(path[step + 1], expected);
    }
    assert!(tree.is_leaf(path[path.len() - 1].0));
}
