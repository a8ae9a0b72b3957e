//! In-memory property dataset
//!
//! Loaded once at startup and never mutated afterwards. Each row gets a
//! sequential identifier (its position in the file), a normalized comuna key,
//! and the curated segment of its comuna. Cluster ids are attached once by
//! [`DatasetIndex::with_clusters`] after the global segmentation is fitted.

use sicop_common::{normalize_comuna, Error, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use super::segments::{SegmentEntry, SegmentTable};

/// Target price column (UF)
pub const TARGET_COLUMN: &str = "precio_en_uf";
/// Locality column
pub const COMUNA_COLUMN: &str = "comuna";
/// Identifier column some exports carry; ignored, ids are reassigned by position
pub const ID_COLUMN: &str = "id_propiedad";
/// Optional listing URL column
pub const URL_COLUMN: &str = "link";

/// Ordered numeric feature columns of the dataset
///
/// Every header except target, comuna, identifier and URL, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    columns: Vec<String>,
    positions: HashMap<String, usize>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        let positions = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { columns, positions }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column, if the dataset has it
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// Position of a column the engine cannot work without
    pub fn require(&self, column: &str) -> Result<usize> {
        self.position(column).ok_or_else(|| {
            Error::Dataset(format!("Dataset is missing required column '{}'", column))
        })
    }
}

/// One known property
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    /// Row position at load time
    pub id: usize,
    pub comuna: String,
    pub comuna_key: String,
    /// Price in UF
    pub price: f64,
    /// Raw numeric values aligned with the [`FeatureSchema`]; `None` when the cell is empty
    pub features: Vec<Option<f64>>,
    pub url: Option<String>,
    /// Global cluster id (0 until [`DatasetIndex::with_clusters`] runs)
    pub cluster: usize,
    /// Curated segment of this row's comuna, if any
    pub segment: Option<SegmentEntry>,
}

/// Per-row values that feed cluster and locality statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberStats {
    pub price: f64,
    pub total_area: Option<f64>,
    pub bedrooms: Option<f64>,
}

/// Aggregated statistics over a group of properties
///
/// Averages skip missing cells; an average over no values is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GroupStats {
    pub count: usize,
    pub mean_price: Option<f64>,
    pub mean_total_area: Option<f64>,
    pub mean_bedrooms: Option<f64>,
}

/// Aggregate member statistics
pub fn summarize(members: impl IntoIterator<Item = MemberStats>) -> GroupStats {
    let mut count = 0usize;
    let mut price = Mean::default();
    let mut area = Mean::default();
    let mut bedrooms = Mean::default();

    for m in members {
        count += 1;
        price.push(Some(m.price));
        area.push(m.total_area);
        bedrooms.push(m.bedrooms);
    }

    GroupStats {
        count,
        mean_price: price.value(),
        mean_total_area: area.value(),
        mean_bedrooms: bedrooms.value(),
    }
}

#[derive(Default)]
struct Mean {
    sum: f64,
    n: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.n += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }
}

/// Immutable table of known properties with a comuna index
#[derive(Debug, Clone)]
pub struct DatasetIndex {
    schema: FeatureSchema,
    records: Vec<PropertyRecord>,
    by_comuna: HashMap<String, Vec<usize>>,
    min_price: f64,
    max_price: f64,
    total_area_col: Option<usize>,
    bedrooms_col: Option<usize>,
}

impl DatasetIndex {
    /// Load the property dataset from a CSV file
    pub fn load(path: &Path, segments: &SegmentTable) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Dataset(format!(
                "Property dataset not found: {}",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, segments)
            .map_err(|e| Error::Dataset(format!("{}: {}", path.display(), e)))
    }

    /// Parse the dataset from any CSV source and left-join the curated segments
    ///
    /// A missing or unparsable price, or an unparsable numeric cell, rejects
    /// the whole dataset. Empty numeric cells are kept as missing values.
    pub fn from_reader<R: Read>(reader: R, segments: &SegmentTable) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| Error::Dataset(format!("Unreadable header row: {}", e)))?
            .clone();

        let find = |name: &str| headers.iter().position(|h| h == name);
        let target_idx = find(TARGET_COLUMN).ok_or_else(|| {
            Error::Dataset(format!("Dataset is missing required column '{}'", TARGET_COLUMN))
        })?;
        let comuna_idx = find(COMUNA_COLUMN).ok_or_else(|| {
            Error::Dataset(format!("Dataset is missing required column '{}'", COMUNA_COLUMN))
        })?;
        let url_idx = find(URL_COLUMN);

        let feature_idx: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| ![TARGET_COLUMN, COMUNA_COLUMN, ID_COLUMN, URL_COLUMN].contains(h))
            .map(|(i, _)| i)
            .collect();
        let schema = FeatureSchema::new(
            feature_idx
                .iter()
                .map(|&i| headers[i].to_string())
                .collect(),
        );

        let mut records = Vec::new();
        for (id, row) in csv_reader.records().enumerate() {
            let row = row.map_err(|e| Error::Dataset(format!("Invalid CSV row: {}", e)))?;
            let line = row.position().map(|p| p.line()).unwrap_or(id as u64 + 2);
            let cell = |i: usize| row.get(i).unwrap_or("");

            let price = parse_number(cell(target_idx))
                .map_err(|raw| {
                    Error::Dataset(format!("line {}: invalid {} '{}'", line, TARGET_COLUMN, raw))
                })?
                .ok_or_else(|| {
                    Error::Dataset(format!("line {}: missing {}", line, TARGET_COLUMN))
                })?;

            let mut features = Vec::with_capacity(feature_idx.len());
            for &i in &feature_idx {
                let value = parse_number(cell(i)).map_err(|raw| {
                    Error::Dataset(format!(
                        "line {}: invalid value '{}' in column '{}'",
                        line, raw, &headers[i]
                    ))
                })?;
                features.push(value);
            }

            let comuna = cell(comuna_idx).to_string();
            let comuna_key = normalize_comuna(&comuna);
            let url = url_idx
                .map(|i| cell(i).to_string())
                .filter(|u| !u.is_empty());
            let segment = segments.get(&comuna_key).cloned();

            records.push(PropertyRecord {
                id,
                comuna,
                comuna_key,
                price,
                features,
                url,
                cluster: 0,
                segment,
            });
        }

        Self::from_records(schema, records)
    }

    /// Index already-parsed records
    pub fn from_records(schema: FeatureSchema, records: Vec<PropertyRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::Dataset("Dataset contains no properties".to_string()));
        }

        let mut by_comuna: HashMap<String, Vec<usize>> = HashMap::new();
        let mut min_price = f64::INFINITY;
        let mut max_price = f64::NEG_INFINITY;
        for (row, record) in records.iter().enumerate() {
            if record.features.len() != schema.len() {
                return Err(Error::Dataset(format!(
                    "Property {} has {} feature values, schema has {}",
                    record.id,
                    record.features.len(),
                    schema.len()
                )));
            }
            by_comuna
                .entry(record.comuna_key.clone())
                .or_default()
                .push(row);
            min_price = min_price.min(record.price);
            max_price = max_price.max(record.price);
        }

        let total_area_col = schema.position("sup_total");
        let bedrooms_col = schema.position("dormitorios");

        Ok(Self {
            schema,
            records,
            by_comuna,
            min_price,
            max_price,
            total_area_col,
            bedrooms_col,
        })
    }

    /// Attach the global cluster id of every row, consuming the index
    pub fn with_clusters(mut self, assignments: &[usize]) -> Result<Self> {
        if assignments.len() != self.records.len() {
            return Err(Error::Internal(format!(
                "{} cluster assignments for {} properties",
                assignments.len(),
                self.records.len()
            )));
        }
        for (record, &cluster) in self.records.iter_mut().zip(assignments) {
            record.cluster = cluster;
        }
        Ok(self)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn records(&self) -> &[PropertyRecord] {
        &self.records
    }

    pub fn record(&self, row: usize) -> &PropertyRecord {
        &self.records[row]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lowest price in the dataset
    pub fn min_price(&self) -> f64 {
        self.min_price
    }

    /// Highest price in the dataset
    pub fn max_price(&self) -> f64 {
        self.max_price
    }

    /// Row positions of a normalized comuna, in file order (empty if unknown)
    pub fn rows_in_comuna(&self, comuna_key: &str) -> &[usize] {
        self.by_comuna
            .get(comuna_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct comuna keys
    pub fn comuna_count(&self) -> usize {
        self.by_comuna.len()
    }

    /// Raw value of a feature column for one row
    pub fn raw_value(&self, row: usize, column: usize) -> Option<f64> {
        self.records[row].features.get(column).copied().flatten()
    }

    /// Raw value of a named column for one row (`None` if absent or empty)
    pub fn raw_named(&self, row: usize, column: &str) -> Option<f64> {
        self.schema
            .position(column)
            .and_then(|col| self.raw_value(row, col))
    }

    /// Price, total area and bedrooms of one row
    pub fn member_stats(&self, row: usize) -> MemberStats {
        MemberStats {
            price: self.records[row].price,
            total_area: self.total_area_col.and_then(|c| self.raw_value(row, c)),
            bedrooms: self.bedrooms_col.and_then(|c| self.raw_value(row, c)),
        }
    }
}

/// `Ok(None)` for an empty or NaN cell, `Err(raw)` when unparsable
fn parse_number(raw: &str) -> std::result::Result<Option<f64>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    let value = match raw.to_ascii_lowercase().as_str() {
        "true" => 1.0,
        "false" => 0.0,
        lowered => lowered.parse::<f64>().map_err(|_| raw.to_string())?,
    };
    if value.is_nan() {
        Ok(None)
    } else if value.is_infinite() {
        Err(raw.to_string())
    } else {
        Ok(Some(value))
    }
}
