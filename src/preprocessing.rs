//! Feature standardisation

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Column-wise z-score scaler
///
/// Columns with zero variance keep a scale of 1 so they are only centred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScalerParts")]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

#[derive(Deserialize)]
struct ScalerParts {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl TryFrom<ScalerParts> for StandardScaler {
    type Error = Error;

    fn try_from(parts: ScalerParts) -> Result<Self> {
        if parts.scale.len() != parts.mean.len() {
            return Err(Error::dims("scaler scale width", parts.mean.len(), parts.scale.len()));
        }
        if parts.scale.iter().any(|&s| !(s > 0.0)) {
            return Err(Error::DataError("scaler scales must be positive".into()));
        }
        Ok(Self {
            mean: parts.mean,
            scale: parts.scale,
        })
    }
}

impl StandardScaler {
    /// Fit on the given rows of `features`
    pub fn fit_rows(features: &Array2<f64>, rows: &[usize]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::DataError("cannot fit a scaler on zero rows".into()));
        }
        if let Some(&row) = rows.iter().find(|&&r| r >= features.nrows()) {
            return Err(Error::dims("scaler row index bound", features.nrows(), row + 1));
        }

        let selected = features.select(Axis(0), rows);
        Ok(Self::fit(&selected))
    }

    /// Fit on every row of a non-empty matrix
    fn fit(features: &Array2<f64>) -> Self {
        let mean = features.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(features.ncols()));
        let scale = features
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Standardise every row
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.mean.len() {
            return Err(Error::dims("scaler feature width", self.mean.len(), features.ncols()));
        }
        Ok((features - &self.mean) / &self.scale)
    }
}
