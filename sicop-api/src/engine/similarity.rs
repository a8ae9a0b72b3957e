//! Locality-restricted k-nearest-neighbour search
//!
//! Candidates are the rows of the query's comuna; when that comuna has no rows
//! the whole dataset is searched instead. Distances are Euclidean over the
//! standardized similarity features, computed against vectors prepared once
//! at load time.

use sicop_common::{Error, Result};

use super::dataset::DatasetIndex;

/// Sum of squared component differences
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    squared_distance(a, b).sqrt()
}

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Dataset row position
    pub row: usize,
    pub distance: f64,
}

/// Ordered hits plus whether the comuna restriction had to be dropped
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub neighbors: Vec<Neighbor>,
    pub fell_back: bool,
}

/// Standardized similarity vectors of every dataset row
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    points: Vec<Vec<f64>>,
}

impl SimilarityIndex {
    /// `points[i]` must be the standardized vector of dataset row `i`
    pub fn new(points: Vec<Vec<f64>>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Up to `k` nearest rows, by non-decreasing distance
    ///
    /// Equal distances keep dataset row order. Returning fewer than `k` hits
    /// is not an error.
    pub fn search(
        &self,
        dataset: &DatasetIndex,
        query: &[f64],
        comuna_key: &str,
        k: usize,
    ) -> Result<SearchResult> {
        if dataset.len() != self.points.len() {
            return Err(Error::Internal(format!(
                "Similarity index has {} rows, dataset has {}",
                self.points.len(),
                dataset.len()
            )));
        }
        if let Some(point) = self.points.first() {
            if point.len() != query.len() {
                return Err(Error::Schema(format!(
                    "Expected {} similarity features, got {}",
                    point.len(),
                    query.len()
                )));
            }
        }

        let local = dataset.rows_in_comuna(comuna_key);
        let fell_back = local.is_empty();

        let mut neighbors: Vec<Neighbor> = if fell_back {
            (0..self.points.len()).map(|row| self.neighbor(row, query)).collect()
        } else {
            local.iter().map(|&row| self.neighbor(row, query)).collect()
        };

        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row)));
        neighbors.truncate(k);

        Ok(SearchResult {
            neighbors,
            fell_back,
        })
    }

    fn neighbor(&self, row: usize, query: &[f64]) -> Neighbor {
        Neighbor {
            row,
            distance: euclidean_distance(&self.points[row], query),
        }
    }
}
