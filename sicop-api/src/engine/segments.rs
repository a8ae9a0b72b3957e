//! Curated comuna segments and locality statistics
//!
//! The curated table maps a normalized comuna key to a business segment. It is
//! maintained by hand and is independent of the k-means clustering. Locality
//! statistics, on the other hand, always come from the dataset itself.

use serde::Deserialize;
use sicop_common::api::{LocalSegment, UNDEFINED_SEGMENT};
use sicop_common::{normalize_comuna, Error, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use super::dataset::{summarize, DatasetIndex};

/// One curated comuna → segment entry
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEntry {
    /// Display name as written in the curated table
    pub comuna: String,
    pub code: i64,
    pub name: String,
}

/// Row layout of the curated CSV
#[derive(Debug, Deserialize)]
struct SegmentRow {
    comuna: String,
    segmento_codigo: i64,
    segmento_nombre: String,
}

/// Curated lookup keyed by normalized comuna
#[derive(Debug, Clone, Default)]
pub struct SegmentTable {
    entries: HashMap<String, SegmentEntry>,
}

impl SegmentTable {
    /// Load the curated table from a CSV file
    ///
    /// Required columns: `comuna`, `segmento_codigo`, `segmento_nombre`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Dataset(format!(
                "Segment table not found: {}",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
            .map_err(|e| Error::Dataset(format!("{}: {}", path.display(), e)))
    }

    /// Parse the curated table from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for row in csv_reader.deserialize::<SegmentRow>() {
            let row = row.map_err(|e| Error::Dataset(format!("Invalid segment row: {}", e)))?;
            entries.push(SegmentEntry {
                comuna: row.comuna,
                code: row.segmento_codigo,
                name: row.segmento_nombre,
            });
        }
        Ok(Self::from_entries(entries))
    }

    /// Build the lookup; on duplicate normalized keys the first entry wins
    pub fn from_entries(entries: impl IntoIterator<Item = SegmentEntry>) -> Self {
        let mut map: HashMap<String, SegmentEntry> = HashMap::new();
        for entry in entries {
            let key = normalize_comuna(&entry.comuna);
            if let Some(existing) = map.get(&key) {
                warn!(
                    "Duplicate curated segment for comuna '{}' (keeping '{}')",
                    entry.comuna, existing.comuna
                );
                continue;
            }
            map.insert(key, entry);
        }
        Self { entries: map }
    }

    /// Look up a normalized comuna key
    pub fn get(&self, comuna_key: &str) -> Option<&SegmentEntry> {
        self.entries.get(comuna_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Curated segment plus dataset statistics for one comuna
///
/// Never fails: an uncurated comuna reports [`UNDEFINED_SEGMENT`] with a null
/// code and the raw input as display name; a comuna without dataset members
/// reports a zero count and null averages.
pub fn resolve_local_segment(
    segments: &SegmentTable,
    dataset: &DatasetIndex,
    raw_comuna: &str,
    comuna_key: &str,
) -> LocalSegment {
    let (display_name, segment_code, segment_name) = match segments.get(comuna_key) {
        Some(entry) => (entry.comuna.clone(), Some(entry.code), entry.name.clone()),
        None => (raw_comuna.to_string(), None, UNDEFINED_SEGMENT.to_string()),
    };

    let stats = summarize(
        dataset
            .rows_in_comuna(comuna_key)
            .iter()
            .map(|&row| dataset.member_stats(row)),
    );

    LocalSegment {
        comuna: display_name,
        segment_code,
        segment_name,
        member_count: stats.count,
        mean_price: stats.mean_price,
        mean_total_area: stats.mean_total_area,
        mean_bedrooms: stats.mean_bedrooms,
    }
}
