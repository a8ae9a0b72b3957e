//! Valuation and segmentation engine
//!
//! [`ValuationEngine`] is built once at startup from the property dataset,
//! the curated segment table and the price model. After construction it is
//! read-only and shared by every request handler.
//!
//! Build order: dataset (with curated left join) → standardizer fit over the
//! similarity features → global k-means → cluster ids attached to the dataset
//! → similarity index → price blender over the observed price range.

pub mod blender;
pub mod clustering;
pub mod dataset;
pub mod features;
pub mod predictor;
pub mod segments;
pub mod similarity;
pub mod standardizer;

use sicop_common::api::{
    EstimateResponse, PropertyInput, SegmentResponse, SimilarMatch, SimilarResponse,
};
use sicop_common::config::{ClusteringConfig, DataFiles, TomlConfig, ValuationConfig};
use sicop_common::{Error, Result};
use tracing::{debug, info};

use blender::{BlendedPrice, PriceBlender};
use clustering::GlobalSegmenter;
use dataset::DatasetIndex;
use features::{similarity_positions, FeatureRow, SIMILARITY_FEATURES};
use predictor::{LinearPricePredictor, PricePredictor};
use segments::{resolve_local_segment, SegmentTable};
use similarity::{SearchResult, SimilarityIndex};
use standardizer::Standardizer;

/// Immutable valuation context
pub struct ValuationEngine {
    dataset: DatasetIndex,
    segments: SegmentTable,
    standardizer: Standardizer,
    segmenter: GlobalSegmenter,
    similarity: SimilarityIndex,
    similarity_positions: Vec<usize>,
    predictor: Box<dyn PricePredictor>,
    blender: PriceBlender,
    valuation: ValuationConfig,
}

/// Per-request derived values
struct PreparedQuery {
    comuna_key: String,
    raw_model_price: f64,
    vector: Vec<f64>,
}

impl ValuationEngine {
    /// Load every input file and build the engine
    ///
    /// `files` must already be resolved against the data folder.
    pub fn load(files: &DataFiles, config: &TomlConfig) -> Result<Self> {
        let segments = SegmentTable::load(&files.segments)?;
        info!(
            "Loaded {} curated comuna segments from {}",
            segments.len(),
            files.segments.display()
        );

        let dataset = DatasetIndex::load(&files.dataset, &segments)?;
        info!(
            "Loaded {} properties in {} comunas ({} feature columns) from {}",
            dataset.len(),
            dataset.comuna_count(),
            dataset.schema().len(),
            files.dataset.display()
        );

        let predictor = LinearPricePredictor::load(&files.model, dataset.schema())?;
        info!(
            "Loaded {} from {}",
            predictor.describe(),
            files.model.display()
        );

        Self::build(
            dataset,
            segments,
            Box::new(predictor),
            &config.valuation,
            &config.clustering,
        )
    }

    /// Fit the standardizer and the global segmentation over a loaded dataset
    pub fn build(
        dataset: DatasetIndex,
        segments: SegmentTable,
        predictor: Box<dyn PricePredictor>,
        valuation: &ValuationConfig,
        clustering: &ClusteringConfig,
    ) -> Result<Self> {
        let positions = similarity_positions(dataset.schema())?;
        let names: Vec<String> = SIMILARITY_FEATURES.iter().map(|s| s.to_string()).collect();

        let rows: Vec<Vec<Option<f64>>> = dataset
            .records()
            .iter()
            .map(|r| positions.iter().map(|&p| r.features[p]).collect())
            .collect();
        let standardizer = Standardizer::fit(&names, &rows)?;
        let points = rows
            .iter()
            .map(|row| standardizer.transform_missing(row))
            .collect::<Result<Vec<_>>>()?;

        let members: Vec<_> = (0..dataset.len()).map(|row| dataset.member_stats(row)).collect();
        let (segmenter, assignments) = GlobalSegmenter::fit(&points, &members, clustering)?;
        for summary in segmenter.summaries() {
            info!(
                cluster = summary.id,
                members = summary.member_count,
                mean_price = summary.mean_price,
                "Global segment '{}'",
                summary.label
            );
        }

        let dataset = dataset.with_clusters(&assignments)?;
        let blender = PriceBlender::new(
            dataset.min_price(),
            dataset.max_price(),
            valuation.model_weight,
        )?;

        Ok(Self {
            dataset,
            segments,
            standardizer,
            segmenter,
            similarity: SimilarityIndex::new(points),
            similarity_positions: positions,
            predictor,
            blender,
            valuation: valuation.clone(),
        })
    }

    pub fn dataset(&self) -> &DatasetIndex {
        &self.dataset
    }

    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    pub fn standardizer(&self) -> &Standardizer {
        &self.standardizer
    }

    pub fn segmenter(&self) -> &GlobalSegmenter {
        &self.segmenter
    }

    pub fn blender(&self) -> &PriceBlender {
        &self.blender
    }

    pub fn valuation_config(&self) -> &ValuationConfig {
        &self.valuation
    }

    /// Blended price using the configured default neighbour count
    pub fn estimate(&self, input: &PropertyInput) -> Result<EstimateResponse> {
        let query = self.prepare(input)?;
        let k = self.valuation.default_k;
        let search = self.search(&query, k)?;
        let blended = self.blend(&query, &search);

        Ok(EstimateResponse {
            adjusted_price: blended.adjusted,
            model_price: blended.model_price,
            k_used: k,
            input: input.clone(),
        })
    }

    /// Blended price plus the neighbours behind it
    ///
    /// `k` defaults to the configured value and must be within `1..=max_k`.
    pub fn find_similar(&self, input: &PropertyInput, k: Option<usize>) -> Result<SimilarResponse> {
        let k = self.resolve_k(k)?;
        let query = self.prepare(input)?;
        let search = self.search(&query, k)?;
        let blended = self.blend(&query, &search);

        let matches = search
            .neighbors
            .iter()
            .map(|n| self.describe_match(n.row, n.distance))
            .collect();

        Ok(SimilarResponse {
            adjusted_price: blended.adjusted,
            model_price: blended.model_price,
            k,
            input: input.clone(),
            matches,
        })
    }

    /// Clamped model price with the global and local segment of the property
    pub fn segment(&self, input: &PropertyInput) -> Result<SegmentResponse> {
        let query = self.prepare(input)?;
        let cluster = self.segmenter.predict(&query.vector)?;
        let global = self.segmenter.describe(cluster)?;
        let local = resolve_local_segment(
            &self.segments,
            &self.dataset,
            &input.comuna,
            &query.comuna_key,
        );
        if local.segment_code.is_none() {
            debug!(comuna = %query.comuna_key, "No curated segment for comuna");
        }

        Ok(SegmentResponse {
            model_price: self.blender.clamp(query.raw_model_price),
            global,
            local,
            input: input.clone(),
        })
    }

    fn resolve_k(&self, k: Option<usize>) -> Result<usize> {
        let k = k.unwrap_or(self.valuation.default_k);
        if k == 0 || k > self.valuation.max_k {
            return Err(Error::InvalidInput(format!(
                "k must be between 1 and {} (got {})",
                self.valuation.max_k, k
            )));
        }
        Ok(k)
    }

    fn prepare(&self, input: &PropertyInput) -> Result<PreparedQuery> {
        input.validate()?;
        let comuna_key = input.comuna_key();
        let row = FeatureRow::from_property(self.dataset.schema(), input);

        // an overflowing prediction is still ordered and clamps to the range
        let raw_model_price = self.predictor.predict(&row, &comuna_key)?;
        if raw_model_price.is_nan() {
            return Err(Error::Internal("Model returned NaN for a valid input".to_string()));
        }

        let vector = self
            .standardizer
            .transform(&row.select(&self.similarity_positions))?;

        Ok(PreparedQuery {
            comuna_key,
            raw_model_price,
            vector,
        })
    }

    fn search(&self, query: &PreparedQuery, k: usize) -> Result<SearchResult> {
        let result = self
            .similarity
            .search(&self.dataset, &query.vector, &query.comuna_key, k)?;
        if result.fell_back {
            debug!(
                comuna = %query.comuna_key,
                "No properties in comuna, searching the whole dataset"
            );
        }
        Ok(result)
    }

    fn blend(&self, query: &PreparedQuery, search: &SearchResult) -> BlendedPrice {
        let prices: Vec<f64> = search
            .neighbors
            .iter()
            .map(|n| self.dataset.record(n.row).price)
            .collect();
        self.blender.blend(query.raw_model_price, &prices)
    }

    fn describe_match(&self, row: usize, distance: f64) -> SimilarMatch {
        let record = self.dataset.record(row);
        let count = |column: &str| self.dataset.raw_named(row, column).map(|v| v.round() as i64);

        SimilarMatch {
            property_id: record.id,
            total_area: self.dataset.raw_named(row, "sup_total"),
            built_area: self.dataset.raw_named(row, "sup_construida"),
            bedrooms: count("dormitorios"),
            bathrooms: count("banos"),
            parking_spots: count("estacionamientos"),
            comuna: record.comuna.clone(),
            price: record.price,
            distance,
            url: record.url.clone().unwrap_or_default(),
            segment_name: record.segment.as_ref().map(|s| s.name.clone()),
        }
    }
}
