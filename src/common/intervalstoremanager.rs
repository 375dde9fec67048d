use std::fmt::Debug;

use crate::{errors::RCFError, types::Result, util::check_argument};

/// Manages the free slot indices of a bounded store as sorted, disjoint,
/// inclusive `(start, end)` intervals.
///
/// `take` vends the smallest free index, which keeps long-lived slots packed
/// at the low end of the store (and therefore inside a partial bounding-box
/// cache). `release` merges an index back into the set and rejects indices
/// that are already free. Both are O(log k) in the number of intervals, up
/// to the vector shifts of splits and merges; k stays small because released
/// indices overwhelmingly rejoin an adjacent interval.
#[repr(C)]
pub struct IntervalStoreManager<T> {
    capacity: usize,
    intervals: Vec<(T, T)>,
}

impl<T: Copy + TryFrom<usize> + PartialEq> IntervalStoreManager<T>
where
    usize: From<T>,
    <T as TryFrom<usize>>::Error: Debug,
{
    pub fn new(size: usize) -> Self {
        let intervals = if size == 0 {
            Vec::new()
        } else {
            vec![(0.try_into().unwrap(), (size - 1).try_into().unwrap())]
        };
        IntervalStoreManager {
            capacity: size,
            intervals,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of free indices.
    pub fn size(&self) -> usize {
        self.intervals
            .iter()
            .map(|&(s, e)| usize::from(e) - usize::from(s) + 1)
            .sum()
    }

    pub fn used(&self) -> usize {
        self.capacity - self.size()
    }

    /// Returns the smallest free index.
    pub fn take(&mut self) -> Result<usize> {
        if self.intervals.is_empty() {
            return Err(RCFError::OutOfCapacity {
                msg: " no more indices left",
            });
        }
        let (start, end) = self.intervals[0];
        let answer: usize = start.into();
        if start == end {
            self.intervals.remove(0);
        } else {
            self.intervals[0].0 = (answer + 1).try_into().unwrap();
        }
        Ok(answer)
    }

    /// Claims a specific index from the free set; used when rebuilding a
    /// store from persisted columns.
    pub fn reserve(&mut self, index: usize) -> Result<()> {
        check_argument(index < self.capacity, " index out of range")?;
        let at = self.locate(index);
        match at {
            Some(pos) => {
                let (start, end) = self.intervals[pos];
                let (start, end): (usize, usize) = (start.into(), end.into());
                if start == end {
                    self.intervals.remove(pos);
                } else if index == start {
                    self.intervals[pos].0 = (index + 1).try_into().unwrap();
                } else if index == end {
                    self.intervals[pos].1 = (index - 1).try_into().unwrap();
                } else {
                    self.intervals[pos].1 = (index - 1).try_into().unwrap();
                    self.intervals.insert(
                        pos + 1,
                        ((index + 1).try_into().unwrap(), end.try_into().unwrap()),
                    );
                }
                Ok(())
            }
            None => Err(RCFError::InvalidArgument {
                msg: " index is not free",
            }),
        }
    }

    /// Returns an index to the free set; releasing an index that is already
    /// free is a caller bug.
    pub fn release(&mut self, index: usize) -> Result<()> {
        check_argument(index < self.capacity, " index out of range")?;
        if self.locate(index).is_some() {
            return Err(RCFError::InvalidArgument {
                msg: " index is already free",
            });
        }
        let pos = self
            .intervals
            .partition_point(|&(s, _)| usize::from(s) < index);
        let merge_left = pos > 0 && usize::from(self.intervals[pos - 1].1) + 1 == index;
        let merge_right =
            pos < self.intervals.len() && index + 1 == usize::from(self.intervals[pos].0);
        if merge_left && merge_right {
            self.intervals[pos - 1].1 = self.intervals[pos].1;
            self.intervals.remove(pos);
        } else if merge_left {
            self.intervals[pos - 1].1 = index.try_into().unwrap();
        } else if merge_right {
            self.intervals[pos].0 = index.try_into().unwrap();
        } else {
            self.intervals
                .insert(pos, (index.try_into().unwrap(), index.try_into().unwrap()));
        }
        Ok(())
    }

    /// Position of the interval containing `index`, if the index is free.
    fn locate(&self, index: usize) -> Option<usize> {
        let pos = self
            .intervals
            .partition_point(|&(s, _)| usize::from(s) <= index);
        if pos > 0 && usize::from(self.intervals[pos - 1].1) >= index {
            Some(pos - 1)
        } else {
            None
        }
    }

    pub fn get_size(&self) -> usize {
        self.intervals.len() * 2 * std::mem::size_of::<T>()
            + std::mem::size_of::<IntervalStoreManager<T>>()
    }
}
