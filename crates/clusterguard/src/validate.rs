//! Dataset validation
//!
//! Runs before any engine call. Some engine failures terminate the process,
//! so malformed input has to be rejected here.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. non-empty array-like container
//! 2. first row array-like and non-empty
//! 3. every row array-like with the first row's length
//! 4. every element numeric
//! 5. every element finite (optional)
//!
//! The structural checks (1-3) cover every row before any per-element scan.

use crate::dataset::DatasetView;
use crate::error::ValidationError;

/// Caller-supplied validation switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Reject NaN and infinite values
    pub check_finite: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self { check_finite: true }
    }
}

impl ValidationOptions {
    /// Structural and numeric checks, non-finite values allowed
    pub fn allow_non_finite() -> Self {
        Self {
            check_finite: false,
        }
    }
}

/// Stateless dataset validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetValidator {
    options: ValidationOptions,
}

impl DatasetValidator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    /// Validate `data` without modifying it.
    pub fn validate<D: DatasetView + ?Sized>(&self, data: &D) -> Result<(), ValidationError> {
        let n_rows = match data.n_rows() {
            Some(n) if n > 0 => n,
            _ => return Err(ValidationError::EmptyInput),
        };

        let n_features = data
            .row_len(0)
            .ok_or(ValidationError::NotTwoDimensional { row: 0 })?;
        if n_features == 0 {
            return Err(ValidationError::NoFeatures);
        }

        for row in 1..n_rows {
            let found = data
                .row_len(row)
                .ok_or(ValidationError::NotTwoDimensional { row })?;
            if found != n_features {
                return Err(ValidationError::InconsistentRowLength {
                    row,
                    expected: n_features,
                    found,
                });
            }
        }

        for row in 0..n_rows {
            for col in 0..n_features {
                let value = data
                    .value(row, col)
                    .ok_or(ValidationError::NonNumericElement { row, col })?;
                if self.options.check_finite && !value.is_finite() {
                    return Err(ValidationError::NonFiniteElement { row, col, value });
                }
            }
        }

        Ok(())
    }

    /// Check that `data` has the column count a fitted model expects.
    ///
    /// Call after [`validate`](Self::validate).
    pub fn validate_features<D: DatasetView + ?Sized>(
        &self,
        data: &D,
        expected: usize,
    ) -> Result<(), ValidationError> {
        let found = data.row_len(0).unwrap_or(0);
        if found != expected {
            return Err(ValidationError::FeatureCountMismatch { expected, found });
        }
        Ok(())
    }
}
