use crate::{common::intervalstoremanager::IntervalStoreManager, types::Result, util::check_argument};

/// Read-only view of the point store, as consumed by a tree.
///
/// A tree resolves leaf point indices through this view and never mutates
/// reference counts itself; count changes are mediated by the update
/// coordinator.
pub trait PointStoreView {
    fn dimensions(&self) -> usize;
    fn copy(&self, index: usize) -> Vec<f32>;
    fn reference(&self, index: usize) -> &[f32];
    fn scaled_point(&self, index: usize, scalar: f32) -> Vec<f32>;
    fn is_equal(&self, point: &[f32], index: usize) -> bool;
}

/// Reference-counted storage of fixed-dimension points in a single flat
/// vector. Slot allocation goes through the interval manager; a slot is
/// reclaimed when its reference count returns to zero.
#[repr(C)]
pub struct VectorizedPointStore {
    dimensions: usize,
    capacity: usize,
    store: Vec<f32>,
    reference_count: Vec<u16>,
    index_manager: IntervalStoreManager<usize>,
}

impl VectorizedPointStore {
    pub fn new(dimensions: usize, capacity: usize) -> Result<Self> {
        check_argument(dimensions > 0, " dimensions must be positive")?;
        check_argument(capacity > 0, " capacity must be positive")?;
        Ok(VectorizedPointStore {
            dimensions,
            capacity,
            store: vec![0.0; dimensions * capacity],
            reference_count: vec![0; capacity],
            index_manager: IntervalStoreManager::<usize>::new(capacity),
        })
    }

    /// Stores a point and returns its index with a reference count of one,
    /// corresponding to the in-flight update that produced it.
    pub fn add(&mut self, point: &[f32]) -> Result<usize> {
        check_argument(point.len() == self.dimensions, " incorrect point length")?;
        let index = self.index_manager.take()?;
        let base = index * self.dimensions;
        self.store[base..base + self.dimensions].copy_from_slice(point);
        self.reference_count[index] = 1;
        Ok(index)
    }

    pub fn inc(&mut self, index: usize) -> Result<()> {
        check_argument(index < self.capacity, " index out of range")?;
        check_argument(self.reference_count[index] > 0, " stale point index")?;
        self.reference_count[index] += 1;
        Ok(())
    }

    pub fn dec(&mut self, index: usize) -> Result<()> {
        check_argument(index < self.capacity, " index out of range")?;
        check_argument(self.reference_count[index] > 0, " stale point index")?;
        self.reference_count[index] -= 1;
        if self.reference_count[index] == 0 {
            self.index_manager.release(index)?;
        }
        Ok(())
    }

    /// Settles the per-tree results of one update round: each inserted point
    /// gains a reference, each evicted point loses one.
    pub fn adjust_count(&mut self, results: &[Option<(usize, Option<usize>)>]) -> Result<()> {
        for result in results {
            if let Some((inserted, evicted)) = result {
                self.inc(*inserted)?;
                if let Some(deleted) = evicted {
                    self.dec(*deleted)?;
                }
            }
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.index_manager.used()
    }

    pub fn get_size(&self) -> usize {
        self.store.len() * std::mem::size_of::<f32>()
            + self.reference_count.len() * std::mem::size_of::<u16>()
            + self.index_manager.get_size()
            + std::mem::size_of::<VectorizedPointStore>()
    }
}

impl PointStoreView for VectorizedPointStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn copy(&self, index: usize) -> Vec<f32> {
        self.reference(index).to_vec()
    }

    fn reference(&self, index: usize) -> &[f32] {
        let base = index * self.dimensions;
        &self.store[base..base + self.dimensions]
    }

    fn scaled_point(&self, index: usize, scalar: f32) -> Vec<f32> {
        self.reference(index).iter().map(|x| x * scalar).collect()
    }

    fn is_equal(&self, point: &[f32], index: usize) -> bool {
        point.eq(self.reference(index))
    }
}
