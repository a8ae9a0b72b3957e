//! Per-feature standardization (z-score)
//!
//! Fitted once over the whole dataset; queries are transformed with the same
//! parameters and nothing is ever refit. Missing dataset cells are imputed with
//! the feature's median before fitting. Standard deviations are population
//! (ddof = 0) values. A zero-variance feature keeps a scale of 1, so it is only
//! centered.

use sicop_common::{Error, Result};
use tracing::warn;

/// Fitted standardization parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    names: Vec<String>,
    medians: Vec<f64>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    /// Fit medians, means and scales column by column
    ///
    /// Every row must have one value slot per name. A column with no values at
    /// all cannot be imputed and is rejected.
    pub fn fit(names: &[String], rows: &[Vec<Option<f64>>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::Dataset("Cannot standardize an empty dataset".to_string()));
        }
        let dim = names.len();
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            return Err(Error::Internal(format!(
                "Row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                dim
            )));
        }

        let mut medians = Vec::with_capacity(dim);
        for (col, name) in names.iter().enumerate() {
            let mut present: Vec<f64> = rows.iter().filter_map(|r| r[col]).collect();
            let median = median(&mut present).ok_or_else(|| {
                Error::Dataset(format!("Feature '{}' has no values to impute from", name))
            })?;
            medians.push(median);
        }

        let n = rows.len() as f64;
        let mut means = vec![0.0; dim];
        for row in rows {
            for (col, value) in row.iter().enumerate() {
                means[col] += value.unwrap_or(medians[col]);
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut variances = vec![0.0; dim];
        for row in rows {
            for (col, value) in row.iter().enumerate() {
                let d = value.unwrap_or(medians[col]) - means[col];
                variances[col] += d * d;
            }
        }

        let scales = variances
            .iter()
            .zip(names)
            .map(|(var, name)| {
                let std = (var / n).sqrt();
                if std > 0.0 {
                    std
                } else {
                    warn!("Feature '{}' has zero variance; scaling left at 1", name);
                    1.0
                }
            })
            .collect();

        Ok(Self {
            names: names.to_vec(),
            medians,
            means,
            scales,
        })
    }

    pub fn dimension(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Fill missing cells with the fitted medians
    pub fn impute(&self, row: &[Option<f64>]) -> Vec<f64> {
        row.iter()
            .zip(&self.medians)
            .map(|(value, median)| value.unwrap_or(*median))
            .collect()
    }

    /// Standardize one complete row
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.dimension() {
            return Err(Error::Schema(format!(
                "Expected {} similarity features, got {}",
                self.dimension(),
                row.len()
            )));
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }

    /// Impute then standardize a dataset row
    pub fn transform_missing(&self, row: &[Option<f64>]) -> Result<Vec<f64>> {
        self.transform(&self.impute(row))
    }
}

/// Median of the values (average of the two middle ones for even counts)
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_fit_population_std() {
        let rows = vec![
            vec![Some(1.0), Some(10.0)],
            vec![Some(2.0), Some(20.0)],
            vec![Some(3.0), Some(30.0)],
        ];
        let s = Standardizer::fit(&names(2), &rows).unwrap();

        assert_eq!(s.means(), &[2.0, 20.0]);
        assert!(close(s.scales()[0], (2.0f64 / 3.0).sqrt()));
        assert!(close(s.scales()[1], (200.0f64 / 3.0).sqrt()));

        let z = s.transform(&[2.0, 20.0]).unwrap();
        assert_eq!(z, vec![0.0, 0.0]);
    }

    #[test]
    fn test_transformed_dataset_has_zero_mean_unit_variance() {
        let rows: Vec<Vec<Option<f64>>> = [3.0, 7.0, 1.0, 9.0, 5.0, 11.0]
            .iter()
            .map(|&v| vec![Some(v)])
            .collect();
        let s = Standardizer::fit(&names(1), &rows).unwrap();

        let z: Vec<f64> = rows
            .iter()
            .map(|r| s.transform_missing(r).unwrap()[0])
            .collect();
        let mean = z.iter().sum::<f64>() / z.len() as f64;
        let var = z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / z.len() as f64;
        assert!(close(mean, 0.0));
        assert!(close(var, 1.0));
    }

    #[test]
    fn test_missing_cells_use_median() {
        let rows = vec![
            vec![Some(1.0)],
            vec![None],
            vec![Some(3.0)],
            vec![Some(10.0)],
        ];
        let s = Standardizer::fit(&names(1), &rows).unwrap();

        // median of [1, 3, 10] is 3
        assert_eq!(s.medians(), &[3.0]);
        assert_eq!(s.impute(&[None]), vec![3.0]);
        // mean over imputed column [1, 3, 3, 10]
        assert!(close(s.means()[0], 4.25));
    }

    #[test]
    fn test_even_count_median() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut values), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_zero_variance_is_identity_scale() {
        let rows = vec![vec![Some(1.0), Some(5.0)], vec![Some(1.0), Some(7.0)]];
        let s = Standardizer::fit(&names(2), &rows).unwrap();

        assert_eq!(s.scales()[0], 1.0);
        let z = s.transform(&[4.0, 6.0]).unwrap();
        assert_eq!(z[0], 3.0);
        assert!(z.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_all_missing_column_rejected() {
        let rows = vec![vec![Some(1.0), None], vec![Some(2.0), None]];
        let err = Standardizer::fit(&names(2), &rows).unwrap_err();
        assert!(err.to_string().contains("f1"));
    }

    #[test]
    fn test_transform_wrong_length_is_schema_error() {
        let rows = vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0), Some(4.0)]];
        let s = Standardizer::fit(&names(2), &rows).unwrap();
        assert!(matches!(s.transform(&[1.0]), Err(Error::Schema(_))));
    }

    #[test]
    fn test_transform_never_refits() {
        let rows = vec![vec![Some(0.0)], vec![Some(10.0)]];
        let s = Standardizer::fit(&names(1), &rows).unwrap();
        let before = s.clone();

        s.transform(&[1000.0]).unwrap();
        assert_eq!(s, before);
    }
}
