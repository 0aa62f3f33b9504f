//! Rectangular score matrices.
//!
//! One row per sample, one column per candidate answer. Rows are stored
//! contiguously (row-major) so the row-wise kernels work on plain slices.

use thiserror::Error;

use super::stable::softmax_with_temperature;

/// Shape errors raised while building a [`ScoreMatrix`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatrixError {
    #[error("row {row} has {actual} columns, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row} has no columns")]
    EmptyRow { row: usize },
}

/// Row-major matrix of raw candidate scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl ScoreMatrix {
    /// Build a matrix from per-sample rows.
    ///
    /// An empty row list is a valid 0×0 matrix.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, MatrixError> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.is_empty() {
                return Err(MatrixError::EmptyRow { row: i });
            }
            if row.len() != n_cols {
                return Err(MatrixError::Ragged {
                    row: i,
                    expected: n_cols,
                    actual: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            data,
            n_rows,
            n_cols,
        })
    }

    /// Single-row matrix (the vector form).
    pub fn from_row(row: Vec<f64>) -> Result<Self, MatrixError> {
        Self::from_rows(vec![row])
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Borrow row `i`. Panics if `i >= n_rows`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// Element at `(r, c)`, or None when out of bounds.
    pub fn get(&self, r: usize, c: usize) -> Option<f64> {
        if r < self.n_rows && c < self.n_cols {
            Some(self.data[r * self.n_cols + c])
        } else {
            None
        }
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        // chunks_exact(0) panics; a 0×0 matrix has no rows to yield anyway.
        self.data.chunks_exact(self.n_cols.max(1)).take(self.n_rows)
    }

    /// Copy back out to nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }

    /// Row-wise softmax of `self / temperature`, same shape as `self`.
    ///
    /// Precondition: `temperature > 0`.
    pub fn softmax_with_temperature(&self, temperature: f64) -> ScoreMatrix {
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.rows() {
            data.extend(softmax_with_temperature(row, temperature));
        }
        ScoreMatrix {
            data,
            n_rows: self.n_rows,
            n_cols: self.n_cols,
        }
    }
}
