//! Query feature rows
//!
//! A query property is expanded into one value per dataset feature column:
//! zero for every column, then the known request fields overlaid by name.

use sicop_common::api::PropertyInput;
use sicop_common::Result;

use super::dataset::FeatureSchema;

/// Features used for both the similarity search and the global clustering
pub const SIMILARITY_FEATURES: [&str; 11] = [
    "sup_total",
    "sup_construida",
    "dormitorios",
    "banos",
    "estacionamientos",
    "antiguedad",
    "pisos",
    "amb_terraza",
    "amb_piscina",
    "srv_aire_acondicionado",
    "amb_closets",
];

/// One complete numeric row aligned with a [`FeatureSchema`]
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: Vec<f64>,
}

impl FeatureRow {
    /// Zero-filled row, then request fields copied into the columns the dataset has
    ///
    /// Amenity flags are encoded 0/1. Request fields without a matching dataset
    /// column are dropped; the predictor only ever sees the dataset schema.
    pub fn from_property(schema: &FeatureSchema, property: &PropertyInput) -> Self {
        let mut values = vec![0.0; schema.len()];

        let known = [
            ("sup_total", property.total_area),
            ("sup_construida", property.built_area),
            ("dormitorios", property.bedrooms as f64),
            ("banos", property.bathrooms as f64),
            ("estacionamientos", property.parking_spots as f64),
            ("antiguedad", property.age_years as f64),
            ("bodegas", property.storage_rooms as f64),
            ("pisos", property.floors as f64),
            ("amb_terraza", flag(property.terrace)),
            ("amb_piscina", flag(property.pool)),
            ("srv_aire_acondicionado", flag(property.air_conditioning)),
            ("amb_closets", flag(property.built_in_closets)),
        ];
        for (column, value) in known {
            if let Some(pos) = schema.position(column) {
                values[pos] = value;
            }
        }

        Self { values }
    }

    /// Wrap raw values; the caller guarantees schema order
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values at the given column positions
    pub fn select(&self, positions: &[usize]) -> Vec<f64> {
        positions.iter().map(|&p| self.values[p]).collect()
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Schema positions of the similarity features; every one must exist
pub fn similarity_positions(schema: &FeatureSchema) -> Result<Vec<usize>> {
    SIMILARITY_FEATURES
        .iter()
        .map(|name| schema.require(name))
        .collect()
}
