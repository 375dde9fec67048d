/// Axis-aligned bounding region given by per-dimension minimum and maximum
/// values, with the range sum `sum_k (max[k] - min[k])` kept current on every
/// mutation. The range sum is the normalizer of the cut probability and also
/// doubles as the "slot is populated" marker in the node store cache.
#[repr(C)]
#[derive(Clone)]
pub struct BoundingBox {
    range_sum: f64,
    min_values: Vec<f32>,
    max_values: Vec<f32>,
}

impl BoundingBox {
    pub fn new(first_values: &[f32], second_values: &[f32]) -> Self {
        let minv: Vec<f32> = first_values
            .iter()
            .zip(second_values)
            .map(|(x, y)| if *x < *y { *x } else { *y })
            .collect();
        let maxv: Vec<f32> = first_values
            .iter()
            .zip(second_values)
            .map(|(x, y)| if *x > *y { *x } else { *y })
            .collect();
        let sum = minv.iter().zip(&maxv).map(|(x, y)| (y - x) as f64).sum();
        BoundingBox {
            min_values: minv,
            max_values: maxv,
            range_sum: sum,
        }
    }

    /// Grows the box to contain `values`; true means the box was unchanged,
    /// i.e. the point was already contained.
    pub fn check_contains_and_add_point(&mut self, values: &[f32]) -> bool {
        self.add_two_arrays(values, values)
    }

    pub fn add_box(&mut self, other: &BoundingBox) {
        self.add_two_arrays(other.get_min_values(), other.get_max_values());
    }

    fn add_two_arrays(&mut self, minvalues: &[f32], maxvalues: &[f32]) -> bool {
        let old_sum = self.range_sum;
        for (x, y) in self.min_values.iter_mut().zip(minvalues) {
            *x = if *x < *y { *x } else { *y };
        }
        for (x, y) in self.max_values.iter_mut().zip(maxvalues) {
            *x = if *x < *y { *y } else { *x };
        }
        self.range_sum = self
            .min_values
            .iter()
            .zip(&self.max_values)
            .map(|(x, y)| (y - x) as f64)
            .sum();
        old_sum == self.range_sum
    }

    pub fn get_range_sum(&self) -> f64 {
        self.range_sum
    }

    pub fn get_min_values(&self) -> &[f32] {
        &self.min_values
    }

    pub fn get_max_values(&self) -> &[f32] {
        &self.max_values
    }

    /// Probability that a random cut over the box grown by `point` separates
    /// the point from the box. Zero when the point is contained; one when
    /// the box is a single point and the query is not.
    pub fn probability_of_cut(&self, point: &[f32]) -> f64 {
        let minsum: f32 = self
            .min_values
            .iter()
            .zip(point)
            .map(|(&x, &y)| if x - y > 0.0 { x - y } else { 0.0 })
            .sum();
        let maxsum: f32 = point
            .iter()
            .zip(&self.max_values)
            .map(|(&x, &y)| if x - y > 0.0 { x - y } else { 0.0 })
            .sum();
        let sum = maxsum + minsum;
        if sum == 0.0 {
            return 0.0;
        } else if self.range_sum == 0.0 {
            return 1.0;
        }
        (sum as f64) / (self.range_sum + sum as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::BoundingBox;

    #[test]
    fn grows_only_when_needed() {
        let mut bounding_box = BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0]);
        assert!(bounding_box.check_contains_and_add_point(&[0.5, 0.5]));
        assert!(!bounding_box.check_contains_and_add_point(&[2.0, 0.5]));
        assert_eq!(bounding_box.get_max_values(), &[2.0, 1.0]);
        assert_eq!(bounding_box.get_range_sum(), 3.0);
    }

    #[test]
    fn probability_of_cut_boundaries() {
        let bounding_box = BoundingBox::new(&[0.0, 0.0], &[1.0, 1.0]);
        assert_eq!(bounding_box.probability_of_cut(&[0.5, 0.5]), 0.0);
        assert_eq!(bounding_box.probability_of_cut(&[1.0, 1.0]), 0.0);
        let p = bounding_box.probability_of_cut(&[2.0, 1.0]);
        assert!((p - 1.0 / 3.0).abs() < 1e-10);

        let degenerate = BoundingBox::new(&[1.0], &[1.0]);
        assert_eq!(degenerate.probability_of_cut(&[2.0]), 1.0);
    }
}
