//! Global market segmentation (k-means)
//!
//! Partitions every known property into a fixed number of clusters over the
//! standardized similarity features, then renumbers clusters by ascending mean
//! price so that cluster id == business-tier rank.
//!
//! Fitting uses `linfa-clustering` and is deterministic for a given seed: one
//! `StdRng::seed_from_u64(seed)` drives k-means++ seeding for all `n_init`
//! runs and the lowest inertia run wins. Stored assignments come from the
//! fitted model's own `predict`, so a dataset row and a query with the same
//! vector always land in the same cluster.

use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sicop_common::api::GlobalSegment;
use sicop_common::config::ClusteringConfig;
use sicop_common::{Error, Result};
use tracing::debug;

use super::dataset::{summarize, MemberStats};

/// One row of the cluster summary table
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSummary {
    pub id: usize,
    pub label: String,
    pub member_count: usize,
    pub mean_price: f64,
    pub mean_total_area: Option<f64>,
    pub mean_bedrooms: Option<f64>,
}

/// Fitted global segmentation, read-only after startup
pub struct GlobalSegmenter {
    model: KMeans<f64, L2Dist>,
    /// Fitted cluster index -> price rank
    rank_of: Vec<usize>,
    /// Centroids in rank order
    centroids: Array2<f64>,
    summaries: Vec<ClusterSummary>,
}

impl GlobalSegmenter {
    /// Fit on standardized points and return the segmenter plus one cluster id per point
    ///
    /// `members[i]` carries the raw price/area/bedrooms of `points[i]`.
    pub fn fit(
        points: &[Vec<f64>],
        members: &[MemberStats],
        config: &ClusteringConfig,
    ) -> Result<(Self, Vec<usize>)> {
        if points.len() != members.len() {
            return Err(Error::Internal(format!(
                "{} points but {} member rows",
                points.len(),
                members.len()
            )));
        }

        let k = config.n_clusters;
        if k == 0 {
            return Err(Error::Config("n_clusters must be at least 1".to_string()));
        }
        if points.len() < k {
            return Err(Error::Dataset(format!(
                "{} properties cannot be split into {} clusters",
                points.len(),
                k
            )));
        }
        let distinct = distinct_count(points);
        if distinct < k {
            return Err(Error::Dataset(format!(
                "only {} distinct feature vectors for {} clusters",
                distinct, k
            )));
        }

        let records = to_matrix(points)?;
        let dataset = DatasetBase::from(records.clone());
        let model = KMeans::params_with_rng(k, StdRng::seed_from_u64(config.seed))
            .n_runs(config.n_init)
            .max_n_iterations(config.max_iter as u64)
            .tolerance(config.tolerance)
            .fit(&dataset)
            .map_err(|e| Error::Dataset(format!("k-means fit failed: {}", e)))?;

        let labels: Array1<usize> = model.predict(&records);
        debug!(
            clusters = k,
            runs = config.n_init,
            points = points.len(),
            "k-means fitted"
        );

        let stats: Vec<_> = (0..k)
            .map(|c| {
                summarize(
                    labels
                        .iter()
                        .zip(members)
                        .filter(|&(&a, _)| a == c)
                        .map(|(_, m)| *m),
                )
            })
            .collect();

        // rank clusters by mean price, ties keep the fitted order
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| {
            let pa = stats[a].mean_price.unwrap_or(f64::INFINITY);
            let pb = stats[b].mean_price.unwrap_or(f64::INFINITY);
            pa.total_cmp(&pb)
        });
        let mut rank_of = vec![0usize; k];
        for (rank, &old) in order.iter().enumerate() {
            rank_of[old] = rank;
        }

        let centroids = model.centroids().select(Axis(0), &order);
        let summaries = order
            .iter()
            .enumerate()
            .map(|(rank, &old)| ClusterSummary {
                id: rank,
                label: tier_label(&config.tier_labels, rank),
                member_count: stats[old].count,
                mean_price: stats[old].mean_price.unwrap_or(0.0),
                mean_total_area: stats[old].mean_total_area,
                mean_bedrooms: stats[old].mean_bedrooms,
            })
            .collect();
        let assignments = labels.iter().map(|&old| rank_of[old]).collect();

        Ok((
            Self {
                model,
                rank_of,
                centroids,
                summaries,
            },
            assignments,
        ))
    }

    /// Cluster of a standardized query vector (nearest fitted centroid)
    pub fn predict(&self, point: &[f64]) -> Result<usize> {
        let dim = self.centroids.ncols();
        if point.len() != dim {
            return Err(Error::Schema(format!(
                "Expected {} similarity features, got {}",
                dim,
                point.len()
            )));
        }
        let query = Array2::from_shape_vec((1, dim), point.to_vec())
            .map_err(|e| Error::Internal(format!("Bad query shape: {}", e)))?;
        let labels: Array1<usize> = self.model.predict(&query);
        labels
            .get(0)
            .map(|&old| self.rank_of[old])
            .ok_or_else(|| Error::Internal("k-means returned no label".to_string()))
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Centroids in rank order, one row per cluster
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    pub fn summaries(&self) -> &[ClusterSummary] {
        &self.summaries
    }

    pub fn summary(&self, cluster: usize) -> Option<&ClusterSummary> {
        self.summaries.get(cluster)
    }

    /// Wire representation of a cluster
    pub fn describe(&self, cluster: usize) -> Result<GlobalSegment> {
        let s = self
            .summary(cluster)
            .ok_or_else(|| Error::Internal(format!("Unknown cluster {}", cluster)))?;
        Ok(GlobalSegment {
            cluster: s.id,
            label: s.label.clone(),
            member_count: s.member_count,
            mean_price: s.mean_price,
            mean_total_area: s.mean_total_area,
            mean_bedrooms: s.mean_bedrooms,
        })
    }
}

/// Label for a price rank; ranks past the configured list get "Segmento {id}"
pub fn tier_label(labels: &[String], rank: usize) -> String {
    labels
        .get(rank)
        .cloned()
        .unwrap_or_else(|| format!("Segmento {}", rank))
}

fn to_matrix(points: &[Vec<f64>]) -> Result<Array2<f64>> {
    let dim = points.first().map_or(0, Vec::len);
    if let Some(bad) = points.iter().position(|p| p.len() != dim) {
        return Err(Error::Internal(format!(
            "point {} has {} features, expected {}",
            bad,
            points[bad].len(),
            dim
        )));
    }
    Array2::from_shape_vec((points.len(), dim), points.concat())
        .map_err(|e| Error::Internal(format!("Bad feature matrix shape: {}", e)))
}

fn distinct_count(points: &[Vec<f64>]) -> usize {
    let mut sorted: Vec<&Vec<f64>> = points.iter().collect();
    let cmp = |a: &&Vec<f64>, b: &&Vec<f64>| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    };
    sorted.sort_by(cmp);
    sorted.dedup_by(|a, b| cmp(a, b).is_eq());
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn config(k: usize) -> ClusteringConfig {
        ClusteringConfig {
            n_clusters: k,
            ..ClusteringConfig::default()
        }
    }

    /// Three well separated blobs in 2-D
    fn blobs() -> Vec<Vec<f64>> {
        let mut points = Vec::new();
        for &(cx, cy) in &[(0.0, 0.0), (10.0, 10.0), (-10.0, 10.0)] {
            for &(dx, dy) in &[(0.1, 0.0), (-0.1, 0.0), (0.0, 0.1), (0.0, -0.1)] {
                points.push(vec![cx + dx, cy + dy]);
            }
        }
        points
    }

    fn member(price: f64) -> MemberStats {
        MemberStats {
            price,
            total_area: Some(price / 100.0),
            bedrooms: Some(2.0),
        }
    }

    fn flat_members(n: usize) -> Vec<MemberStats> {
        (0..n).map(|i| member(100.0 * i as f64)).collect()
    }

    #[test]
    fn test_recovers_separated_blobs() {
        let points = blobs();
        let (segmenter, assignments) =
            GlobalSegmenter::fit(&points, &flat_members(12), &config(3)).unwrap();

        for blob in assignments.chunks(4) {
            assert!(blob.iter().all(|&c| c == blob[0]), "blob split: {:?}", blob);
        }
        let mut distinct = assignments.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 3);
        assert_eq!(segmenter.n_clusters(), 3);
        assert_eq!(segmenter.centroids().dim(), (3, 2));
    }

    #[test]
    fn test_fit_is_deterministic() {
        let points = blobs();
        let members = flat_members(12);
        let (a, assign_a) = GlobalSegmenter::fit(&points, &members, &config(3)).unwrap();
        let (b, assign_b) = GlobalSegmenter::fit(&points, &members, &config(3)).unwrap();
        assert_eq!(assign_a, assign_b);
        assert_eq!(a.summaries(), b.summaries());
        assert_eq!(a.centroids(), b.centroids());
    }

    #[test]
    fn test_too_few_points_rejected() {
        let points = vec![vec![0.0], vec![1.0]];
        assert!(matches!(
            GlobalSegmenter::fit(&points, &flat_members(2), &config(4)),
            Err(Error::Dataset(_))
        ));
    }

    #[test]
    fn test_too_few_distinct_points_rejected() {
        let points = vec![vec![1.0, 1.0]; 5]
            .into_iter()
            .chain(std::iter::once(vec![2.0, 2.0]))
            .collect::<Vec<_>>();
        let err = GlobalSegmenter::fit(&points, &flat_members(6), &config(4)).err();
        assert!(matches!(err, Some(Error::Dataset(_))), "{:?}", err);
    }

    #[test]
    fn test_labels_follow_mean_price() {
        let points = blobs();
        // blob 0 expensive, blob 1 cheap, blob 2 mid
        let members: Vec<MemberStats> = (0..12)
            .map(|i| match i / 4 {
                0 => member(9000.0),
                1 => member(2000.0),
                _ => member(5000.0),
            })
            .collect();

        let (segmenter, assignments) =
            GlobalSegmenter::fit(&points, &members, &config(3)).unwrap();

        assert!(assignments[4..8].iter().all(|&c| c == 0));
        assert!(assignments[8..12].iter().all(|&c| c == 1));
        assert!(assignments[0..4].iter().all(|&c| c == 2));

        let summaries = segmenter.summaries();
        assert_eq!(summaries[0].label, "Segmento Económico");
        assert_eq!(summaries[0].mean_price, 2000.0);
        assert_eq!(summaries[1].label, "Segmento Medio-bajo");
        assert_eq!(summaries[2].label, "Segmento Medio-alto");
        assert_eq!(summaries[2].member_count, 4);
        assert_eq!(summaries[2].mean_total_area, Some(90.0));

        for pair in summaries.windows(2) {
            assert!(pair[0].mean_price <= pair[1].mean_price);
        }

        // centroid rows follow the renumbering: the cheap blob sits at (10, 10)
        let cheap = segmenter.centroids().row(0);
        assert!((cheap[0] - 10.0).abs() < 0.5 && (cheap[1] - 10.0).abs() < 0.5);
    }

    #[test]
    fn test_predict_uses_fitted_centroids() {
        let points = blobs();
        let members: Vec<MemberStats> = (0..12).map(|i| member(1000.0 * (i / 4) as f64)).collect();
        let (segmenter, assignments) =
            GlobalSegmenter::fit(&points, &members, &config(3)).unwrap();

        assert_eq!(segmenter.predict(&[9.5, 9.8]).unwrap(), assignments[4]);
        assert_eq!(segmenter.predict(&[0.2, -0.3]).unwrap(), assignments[0]);
        assert!(matches!(segmenter.predict(&[1.0]), Err(Error::Schema(_))));
    }

    #[test]
    fn test_stored_clusters_match_predict_after_early_stop() {
        // overlapping cloud, stopped before convergence
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<Vec<f64>> = (0..60)
            .map(|_| vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)])
            .collect();
        let cfg = ClusteringConfig {
            n_clusters: 4,
            n_init: 1,
            max_iter: 2,
            ..ClusteringConfig::default()
        };

        let (segmenter, assignments) =
            GlobalSegmenter::fit(&points, &flat_members(60), &cfg).unwrap();
        for (point, &stored) in points.iter().zip(&assignments) {
            assert_eq!(segmenter.predict(point).unwrap(), stored);
        }
    }

    #[test]
    fn test_describe_cluster() {
        let points = blobs();
        let (segmenter, _) = GlobalSegmenter::fit(&points, &flat_members(12), &config(3)).unwrap();

        let global = segmenter.describe(0).unwrap();
        assert_eq!(global.cluster, 0);
        assert_eq!(global.label, "Segmento Económico");
        assert_eq!(global.member_count, 4);
        assert!(segmenter.describe(7).is_err());
    }

    #[test]
    fn test_overflow_labels() {
        let labels: Vec<String> = vec!["Bajo".into(), "Alto".into()];
        assert_eq!(tier_label(&labels, 1), "Alto");
        assert_eq!(tier_label(&labels, 2), "Segmento 2");
    }

    #[test]
    fn test_distinct_count() {
        let points = vec![vec![1.0, 2.0], vec![0.0, 5.0], vec![1.0, 2.0]];
        assert_eq!(distinct_count(&points), 2);
    }
}
