//! Dataset views and statistics
//!
//! The dataset is caller-owned. [`DatasetView`] lets the validator inspect
//! typed rows (`Vec<Vec<f64>>`) and untyped input (`serde_json::Value`, where
//! non-array rows and non-numeric cells can occur) through one interface.

use serde::Serialize;

/// Owned rectangular data handed to the engine.
pub type Rows = Vec<Vec<f64>>;

/// Read-only view of a 2D dataset.
pub trait DatasetView {
    /// Number of rows, or `None` when the container is not array-like
    fn n_rows(&self) -> Option<usize>;

    /// Length of `row`, or `None` when that row is not array-like
    fn row_len(&self, row: usize) -> Option<usize>;

    /// Numeric value at `[row, col]`, or `None` when the cell is not a number
    fn value(&self, row: usize, col: usize) -> Option<f64>;
}

impl DatasetView for [Vec<f64>] {
    fn n_rows(&self) -> Option<usize> {
        Some(self.len())
    }

    fn row_len(&self, row: usize) -> Option<usize> {
        self.get(row).map(Vec::len)
    }

    fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.get(row)?.get(col).copied()
    }
}

impl DatasetView for [Vec<f32>] {
    fn n_rows(&self) -> Option<usize> {
        Some(self.len())
    }

    fn row_len(&self, row: usize) -> Option<usize> {
        self.get(row).map(Vec::len)
    }

    fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.get(row)?.get(col).map(|&v| f64::from(v))
    }
}

impl<T> DatasetView for Vec<Vec<T>>
where
    [Vec<T>]: DatasetView,
{
    fn n_rows(&self) -> Option<usize> {
        self.as_slice().n_rows()
    }

    fn row_len(&self, row: usize) -> Option<usize> {
        self.as_slice().row_len(row)
    }

    fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.as_slice().value(row, col)
    }
}

impl DatasetView for serde_json::Value {
    fn n_rows(&self) -> Option<usize> {
        self.as_array().map(Vec::len)
    }

    fn row_len(&self, row: usize) -> Option<usize> {
        self.as_array()?.get(row)?.as_array().map(Vec::len)
    }

    fn value(&self, row: usize, col: usize) -> Option<f64> {
        self.as_array()?.get(row)?.as_array()?.get(col)?.as_f64()
    }
}

/// Copy a validated view into owned rows.
///
/// Cells that are not numbers become NaN; run the validator first.
pub fn to_rows<D: DatasetView + ?Sized>(data: &D) -> Rows {
    let n_rows = data.n_rows().unwrap_or(0);
    (0..n_rows)
        .map(|i| {
            let len = data.row_len(i).unwrap_or(0);
            (0..len)
                .map(|j| data.value(i, j).unwrap_or(f64::NAN))
                .collect()
        })
        .collect()
}

/// Shape and value range of a dataset, reported in classified errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetStats {
    pub n_samples: usize,
    pub n_features: usize,
    /// Smallest finite value, if any
    pub min: Option<f64>,
    /// Largest finite value, if any
    pub max: Option<f64>,
}

impl DatasetStats {
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        for &v in rows.iter().flatten().filter(|v| v.is_finite()) {
            min = Some(min.map_or(v, |m| m.min(v)));
            max = Some(max.map_or(v, |m| m.max(v)));
        }

        Self {
            n_samples: rows.len(),
            n_features: rows.first().map_or(0, Vec::len),
            min,
            max,
        }
    }

    /// Spread between the largest and smallest finite value
    pub fn range(&self) -> Option<f64> {
        Some(self.max? - self.min?)
    }

    /// One-line summary, e.g. `10 samples x 3 features, values in [-1.5, 4]`
    ///
    /// Empty stats (calls such as `load` that take no data) read as no dataset.
    pub fn describe(&self) -> String {
        if self.n_samples == 0 {
            return "no dataset involved".to_string();
        }
        let shape = format!(
            "{} samples x {} features",
            self.n_samples, self.n_features
        );
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{}, values in [{}, {}]", shape, min, max),
            _ => format!("{}, no finite values", shape),
        }
    }
}
