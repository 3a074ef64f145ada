//! The tape: a fixed number of cells addressed by the data pointer.
use super::{BoundsFault, BoundsPolicy, Cell};

/// A fixed-length tape of cells. A tape belongs to exactly one run.
#[derive(Clone, Debug)]
pub struct Tape<C> {
    cells: Vec<C>,
}

impl<C: Cell> Tape<C> {
    /// Create a zeroed tape. A tape always has at least one cell.
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![C::zero(); size.max(1)],
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, i: usize) -> C {
        self.cells[i]
    }

    pub fn get_mut(&mut self, i: usize) -> &mut C {
        &mut self.cells[i]
    }

    pub fn cells(&self) -> &[C] {
        &self.cells
    }

    /// Zero every cell.
    pub fn reset(&mut self) {
        self.cells.fill(C::zero());
    }

    /// Copy the tape out as unsigned values, for inspection from another thread.
    pub fn snapshot(&self) -> Vec<u32> {
        self.cells.iter().map(|c| c.to_unsigned()).collect()
    }

    /// Where the data pointer lands after moving `delta` cells from `pointer`.
    pub fn offset(
        &self,
        pointer: usize,
        delta: isize,
        bounds: BoundsPolicy,
    ) -> Result<usize, BoundsFault> {
        let len = self.cells.len() as i128;
        let target = pointer as i128 + delta as i128;
        match bounds {
            BoundsPolicy::Wrap => Ok(target.rem_euclid(len) as usize),
            BoundsPolicy::Fatal if target < 0 => Err(BoundsFault::Underflow),
            BoundsPolicy::Fatal if target >= len => Err(BoundsFault::Overflow),
            BoundsPolicy::Fatal => Ok(target as usize),
        }
    }

    /// Find the nearest zero cell starting at `pointer` (inclusive) and
    /// moving right, or left.
    ///
    /// The scan first runs toward the near end of the tape. Under
    /// [`BoundsPolicy::Wrap`] it then continues from the far end back to
    /// `pointer`; under [`BoundsPolicy::Fatal`] running off the end is the
    /// same escape the unfolded loop would have made.
    pub fn scan_zero(
        &self,
        pointer: usize,
        rightward: bool,
        bounds: BoundsPolicy,
    ) -> Result<usize, BoundsFault> {
        let is_zero = |i: &usize| self.cells[*i].is_zero();
        let len = self.cells.len();
        let near = if rightward {
            (pointer..len).find(is_zero)
        } else {
            (0..=pointer).rev().find(is_zero)
        };
        if let Some(i) = near {
            return Ok(i);
        }

        match bounds {
            BoundsPolicy::Fatal if rightward => Err(BoundsFault::Overflow),
            BoundsPolicy::Fatal => Err(BoundsFault::Underflow),
            BoundsPolicy::Wrap => {
                let far = if rightward {
                    (0..pointer).find(is_zero)
                } else {
                    (pointer + 1..len).rev().find(is_zero)
                };
                far.ok_or(BoundsFault::NoZeroCell)
            }
        }
    }
}
