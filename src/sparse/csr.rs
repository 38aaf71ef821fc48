//! CSR (Compressed Sparse Row) format

use crate::buffer::Buffer;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

/// CSR (Compressed Sparse Row) sparse matrix data
#[derive(Debug, Clone)]
pub struct CsrData<R: Runtime, T: Element> {
    pub(crate) row_ptrs: Buffer<R, i64>,
    pub(crate) col_indices: Buffer<R, i64>,
    pub(crate) values: Buffer<R, T>,
    pub(crate) shape: [usize; 2],
}

impl<R: Runtime, T: Element> CsrData<R, T> {
    /// Create a CSR matrix from device components
    ///
    /// # Arguments
    ///
    /// * `row_ptrs` - Row pointers (length: nrows + 1)
    /// * `col_indices` - Column indices for each non-zero
    /// * `values` - Values at each position
    /// * `shape` - Matrix shape [nrows, ncols]
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - row_ptrs length != nrows + 1
    /// - col_indices and values have different lengths
    /// - row pointers are not non-decreasing from 0 to nnz
    /// - a column index is outside `[0, ncols)`
    pub fn new(
        row_ptrs: Buffer<R, i64>,
        col_indices: Buffer<R, i64>,
        values: Buffer<R, T>,
        shape: [usize; 2],
    ) -> Result<Self> {
        let [nrows, ncols] = shape;
        let nnz = values.len();

        if row_ptrs.len() != nrows + 1 {
            return Err(Error::ShapeMismatch {
                expected: vec![nrows + 1],
                got: vec![row_ptrs.len()],
            });
        }
        if col_indices.len() != nnz {
            return Err(Error::ShapeMismatch {
                expected: vec![nnz],
                got: vec![col_indices.len()],
            });
        }

        let ptrs = row_ptrs.to_vec()?;
        if ptrs.first() != Some(&0) || ptrs.last() != Some(&(nnz as i64)) {
            return Err(Error::invalid_argument(
                1,
                "row_ptrs",
                format!("must run from 0 to nnz = {}", nnz),
            ));
        }
        if ptrs.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::invalid_argument(1, "row_ptrs", "must be non-decreasing"));
        }
        if let Some(&col) = col_indices
            .to_vec()?
            .iter()
            .find(|&&c| c < 0 || c as usize >= ncols)
        {
            return Err(Error::invalid_argument(
                2,
                "col_indices",
                format!("column {} outside [0, {})", col, ncols),
            ));
        }

        Ok(Self {
            row_ptrs,
            col_indices,
            values,
            shape,
        })
    }

    /// Copy host components to the device and validate them
    pub fn from_host(
        row_ptrs: &[i64],
        col_indices: &[i64],
        values: &[T],
        shape: [usize; 2],
        device: &R::Device,
    ) -> Result<Self> {
        Self::new(
            Buffer::from_slice(row_ptrs, device)?,
            Buffer::from_slice(col_indices, device)?,
            Buffer::from_slice(values, device)?,
            shape,
        )
    }

    /// Returns the row pointers buffer
    pub fn row_ptrs(&self) -> &Buffer<R, i64> {
        &self.row_ptrs
    }

    /// Returns the column indices buffer
    pub fn col_indices(&self) -> &Buffer<R, i64> {
        &self.col_indices
    }

    /// Returns the values buffer
    pub fn values(&self) -> &Buffer<R, T> {
        &self.values
    }

    /// Matrix shape `[nrows, ncols]`
    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    /// Number of rows
    pub fn nrows(&self) -> usize {
        self.shape[0]
    }

    /// Number of columns
    pub fn ncols(&self) -> usize {
        self.shape[1]
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Copy the three components back to the host
    pub fn to_host(&self) -> Result<(Vec<i64>, Vec<i64>, Vec<T>)> {
        Ok((
            self.row_ptrs.to_vec()?,
            self.col_indices.to_vec()?,
            self.values.to_vec()?,
        ))
    }
}
