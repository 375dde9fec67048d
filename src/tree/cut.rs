use crate::tree::boundingbox::BoundingBox;

/// A `(dimension, value)` pair splitting a bounding box. Nodes do not store
/// cuts in this form; it only travels between the cut drawing policy and the
/// node store.
pub struct Cut {
    pub dimension: usize,
    pub value: f32,
}

impl Cut {
    pub fn new(dimension: usize, value: f32) -> Self {
        Cut { dimension, value }
    }

    /// Total length the box must stretch to cover `point`; zero means the
    /// point is already inside and no cut can separate it.
    fn extension(bounding_box: &BoundingBox, point: &[f32]) -> f64 {
        let mut total = 0.0f64;
        for ((low, high), value) in bounding_box
            .get_min_values()
            .iter()
            .zip(bounding_box.get_max_values())
            .zip(point)
        {
            if value < low {
                total += (low - value) as f64;
            } else if value > high {
                total += (value - high) as f64;
            }
        }
        total
    }

    /// Draws the cut determined by `factor` (uniform in [0,1)) on the box
    /// grown by `point`, returning it together with whether the cut
    /// separates the point from the box.
    ///
    /// The draw walks the dimensions of the grown box, spending `factor`
    /// times its total range until the remainder lands inside one span. A
    /// remainder that rounds onto a span boundary is pulled back to the
    /// span's low end.
    pub fn random_cut_and_separation(
        bounding_box: &BoundingBox,
        factor: f64,
        point: &[f32],
    ) -> (Cut, bool) {
        let extension = Self::extension(bounding_box, point);
        if extension == 0.0 {
            return (Cut::new(usize::MAX, 0.0), false);
        }
        let mut remainder = (extension + bounding_box.get_range_sum()) * factor;
        let lower = bounding_box.get_min_values();
        let upper = bounding_box.get_max_values();

        let last = point.len() - 1;
        let mut chosen = last;
        let mut cut_value = f32::MAX;
        for dimension in 0..point.len() {
            let low = if point[dimension] < lower[dimension] {
                point[dimension]
            } else {
                lower[dimension]
            };
            let high = if point[dimension] > upper[dimension] {
                point[dimension]
            } else {
                upper[dimension]
            };
            let span = high - low;
            if span > remainder as f32 || (span == remainder as f32 && dimension == last) {
                cut_value = low + remainder as f32; // precision lost here
                if cut_value <= low || cut_value >= high {
                    cut_value = low;
                }
                chosen = dimension;
                break;
            }
            remainder -= span as f64;
        }

        let separation = ((point[chosen] <= cut_value) && (cut_value < lower[chosen]))
            || ((upper[chosen] <= cut_value) && (cut_value < point[chosen]));
        (Cut::new(chosen, cut_value), separation)
    }
}
