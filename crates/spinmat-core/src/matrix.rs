//! Result containers: half-filled square matrices and the flat null table.

use serde::ser::{Serialize, Serializer};

use crate::map::MapKey;

/// `n × n` matrix whose only defined cells lie strictly above the diagonal.
/// Every cell with `row >= col` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpperTriangle {
    n: usize,
    cells: Vec<Option<f64>>,
}

impl UpperTriangle {
    pub fn new(n: usize) -> Self {
        Self { n, cells: vec![None; n * n] }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Value at `(row, col)`; `None` for undefined or out-of-range cells.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.n || col >= self.n {
            return None;
        }
        self.cells[row * self.n + col]
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < col, "cell ({row}, {col}) is not above the diagonal");
        self.cells[row * self.n + col] = Some(value);
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<f64>]> + '_ {
        (0..self.n).map(move |r| &self.cells[r * self.n..(r + 1) * self.n])
    }

    /// Defined cells in row-major order.
    pub fn defined(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(idx, v)| v.map(|v| (idx / self.n, idx % self.n, v)))
    }
}

/// Serialized as nested rows, `null` for undefined cells.
impl Serialize for UpperTriangle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows())
    }
}

/// Null correlations of one pair. `row` and `col` are 1-based map indices.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NullRow {
    pub row: usize,
    pub col: usize,
    pub values: Vec<f64>,
}

/// One row per compared pair, in traversal order.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NullTable {
    pub n_perm: usize,
    pub rows: Vec<NullRow>,
}

impl NullTable {
    pub fn with_capacity(n_perm: usize, n_pairs: usize) -> Self {
        Self { n_perm, rows: Vec::with_capacity(n_pairs) }
    }

    /// Two index columns plus one per permutation.
    pub fn n_columns(&self) -> usize {
        self.n_perm + 2
    }
}

/// Everything one run produces, index-aligned with `labels`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResultMatrices {
    pub labels: Vec<MapKey>,
    pub correlations: UpperTriangle,
    pub p_values: UpperTriangle,
    pub null_table: NullTable,
}

/// Number of unordered pairs among `n` maps.
pub fn n_pairs(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}
