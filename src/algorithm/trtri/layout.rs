//! Mapping between global matrix indices and the tiled inverse buffer

use super::{full_inverse_nb, inverse_buffer_len};
use crate::dtype::Element;
use crate::error::{Error, Result};

/// Layout of a `d_dinv` buffer holding `nb×nb` diagonal-block inverses
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InverseLayout {
    n: usize,
    nb: usize,
}

impl InverseLayout {
    /// Layout of `nb×nb` tiles over an n×n matrix
    pub fn new(n: usize, nb: usize) -> Self {
        Self { n, nb }
    }

    /// Layout produced by a full inversion of an n×n matrix
    pub fn full(n: usize) -> Self {
        Self::new(n, full_inverse_nb(n))
    }

    /// Matrix order
    pub fn n(&self) -> usize {
        self.n
    }

    /// Tile side
    pub fn nb(&self) -> usize {
        self.nb
    }

    /// Number of tiles
    pub fn num_tiles(&self) -> usize {
        self.n.div_ceil(self.nb)
    }

    /// Elements in the buffer
    pub fn len(&self) -> usize {
        inverse_buffer_len(self.n, self.nb)
    }

    /// True for an empty matrix
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Buffer offset of global `(i, j)`, or `None` outside the diagonal tiles
    pub fn offset(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.n || j >= self.n || i / self.nb != j / self.nb {
            return None;
        }
        let tile = i / self.nb;
        Some(tile * self.nb * self.nb + (j % self.nb) * self.nb + i % self.nb)
    }

    /// Unpack the diagonal tiles into a dense column-major n×n matrix
    ///
    /// Entries outside the diagonal tiles are zero.
    pub fn to_dense<T: Element>(&self, dinv: &[T]) -> Result<Vec<T>> {
        if dinv.len() < self.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.len()],
                got: vec![dinv.len()],
            });
        }
        let mut dense = vec![T::zero(); self.n * self.n];
        for j in 0..self.n {
            let tile_start = (j / self.nb) * self.nb;
            let tile_end = (tile_start + self.nb).min(self.n);
            for i in tile_start..tile_end {
                if let Some(off) = self.offset(i, j) {
                    dense[j * self.n + i] = dinv[off];
                }
            }
        }
        Ok(dense)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let layout = InverseLayout::new(40, 16);
        assert_eq!(layout.num_tiles(), 3);
        assert_eq!(layout.len(), 3 * 256);
        assert_eq!(layout.offset(17, 18), Some(256 + 2 * 16 + 1));
        assert_eq!(layout.offset(15, 16), None);
        assert_eq!(layout.offset(39, 39), Some(2 * 256 + 7 * 16 + 7));
        assert_eq!(layout.offset(40, 39), None);
    }

    #[test]
    fn test_to_dense() {
        let layout = InverseLayout::full(2);
        assert_eq!(layout.nb(), 16);
        let mut dinv = vec![0.0f64; layout.len()];
        dinv[0] = 1.0;
        dinv[16] = 2.0;
        dinv[17] = 3.0;
        assert_eq!(layout.to_dense(&dinv).unwrap(), vec![1.0, 0.0, 2.0, 3.0]);
        assert!(layout.to_dense(&dinv[..10]).is_err());
    }
}
