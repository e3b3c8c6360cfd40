/// Binary indexed tree over positions `1..=capacity` holding `u32` weights.
///
/// Position 0 is reserved; the structure is only used with 1-based positions.
#[derive(Clone, Debug)]
pub struct Fenwick {
    cells: Vec<u32>,
}

#[inline]
fn lowbit(i: usize) -> usize {
    i & i.wrapping_neg()
}

impl Fenwick {
    /// Creates an empty tree able to address positions `1..=capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: vec![0; capacity + 1],
        }
    }

    /// Highest addressable position.
    pub fn capacity(&self) -> usize {
        self.cells.len() - 1
    }

    /// Zeroes every cell.
    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = 0);
    }

    /// Adds `weight` at `pos`.
    pub fn add(&mut self, mut pos: usize, weight: u32) {
        debug_assert!(pos > 0, "fenwick positions are 1-based");
        if pos == 0 {
            return;
        }
        while pos <= self.capacity() {
            self.cells[pos] += weight;
            pos += lowbit(pos);
        }
    }

    /// Sum of the weights at positions `1..=pos`.
    pub fn prefix_sum(&self, pos: usize) -> u32 {
        let mut pos = pos.min(self.capacity());
        let mut total = 0;
        while pos > 0 {
            total += self.cells[pos];
            pos -= lowbit(pos);
        }
        total
    }
}
