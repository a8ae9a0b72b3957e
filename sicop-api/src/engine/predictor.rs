//! Regression model seam
//!
//! The engine only needs `predict(features, comuna) -> price`. The shipped
//! implementation evaluates a linear model exported as JSON: every numeric
//! column is standardized with its own center/scale, weighted, summed with an
//! intercept, and the comuna contributes a one-hot offset (unknown comunas
//! contribute nothing).
//!
//! ```json
//! {
//!   "intercept": 5200.0,
//!   "features": [
//!     { "column": "sup_total", "center": 110.0, "scale": 45.0, "weight": 950.0 }
//!   ],
//!   "comuna_offsets": { "Ñuñoa": 800.0, "Puente Alto": -1400.0 }
//! }
//! ```

use serde::Deserialize;
use sicop_common::{normalize_comuna, Error, Result};
use std::collections::HashMap;
use std::path::Path;

use super::dataset::FeatureSchema;
use super::features::FeatureRow;

/// A trained price model over the dataset feature schema
pub trait PricePredictor: Send + Sync {
    /// Raw (unclamped) price in UF
    fn predict(&self, row: &FeatureRow, comuna_key: &str) -> Result<f64>;

    /// Short description for startup logs
    fn describe(&self) -> String;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinearArtifact {
    intercept: f64,
    features: Vec<LinearTerm>,
    #[serde(default)]
    comuna_offsets: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinearTerm {
    column: String,
    center: f64,
    scale: f64,
    weight: f64,
}

/// Term bound to a schema position
#[derive(Debug, Clone, PartialEq)]
struct BoundTerm {
    position: usize,
    center: f64,
    scale: f64,
    weight: f64,
}

/// Linear model with standardized inputs and comuna offsets
#[derive(Debug, Clone)]
pub struct LinearPricePredictor {
    intercept: f64,
    terms: Vec<BoundTerm>,
    schema_len: usize,
    comuna_offsets: HashMap<String, f64>,
}

impl LinearPricePredictor {
    /// Load a JSON artifact and bind it to the dataset schema
    pub fn load(path: &Path, schema: &FeatureSchema) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Model(format!(
                "Model artifact not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content, schema)
            .map_err(|e| Error::Model(format!("{}: {}", path.display(), e)))
    }

    /// Parse an artifact; every referenced column must exist in `schema`
    pub fn from_json(content: &str, schema: &FeatureSchema) -> Result<Self> {
        let artifact: LinearArtifact = serde_json::from_str(content)
            .map_err(|e| Error::Model(format!("Invalid model artifact: {}", e)))?;

        if !artifact.intercept.is_finite() {
            return Err(Error::Model("intercept must be finite".to_string()));
        }

        let mut terms = Vec::with_capacity(artifact.features.len());
        for term in artifact.features {
            let position = schema.position(&term.column).ok_or_else(|| {
                Error::Model(format!(
                    "Model column '{}' is not in the dataset schema",
                    term.column
                ))
            })?;
            if !(term.scale.is_finite() && term.scale > 0.0)
                || !term.center.is_finite()
                || !term.weight.is_finite()
            {
                return Err(Error::Model(format!(
                    "Model column '{}' has invalid center/scale/weight",
                    term.column
                )));
            }
            terms.push(BoundTerm {
                position,
                center: term.center,
                scale: term.scale,
                weight: term.weight,
            });
        }

        let mut comuna_offsets = HashMap::new();
        for (comuna, offset) in artifact.comuna_offsets {
            if !offset.is_finite() {
                return Err(Error::Model(format!(
                    "Offset for comuna '{}' must be finite",
                    comuna
                )));
            }
            if comuna_offsets.insert(normalize_comuna(&comuna), offset).is_some() {
                return Err(Error::Model(format!(
                    "Comuna '{}' appears twice after normalization",
                    comuna
                )));
            }
        }

        Ok(Self {
            intercept: artifact.intercept,
            terms,
            schema_len: schema.len(),
            comuna_offsets,
        })
    }
}

impl PricePredictor for LinearPricePredictor {
    fn predict(&self, row: &FeatureRow, comuna_key: &str) -> Result<f64> {
        if row.len() != self.schema_len {
            return Err(Error::Schema(format!(
                "Model expects {} features, got {}",
                self.schema_len,
                row.len()
            )));
        }
        let values = row.values();
        let linear: f64 = self
            .terms
            .iter()
            .map(|t| t.weight * (values[t.position] - t.center) / t.scale)
            .sum();
        let offset = self.comuna_offsets.get(comuna_key).copied().unwrap_or(0.0);
        Ok(self.intercept + linear + offset)
    }

    fn describe(&self) -> String {
        format!(
            "linear model ({} terms, {} comuna offsets)",
            self.terms.len(),
            self.comuna_offsets.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            "sup_total".to_string(),
            "dormitorios".to_string(),
            "gastos_comunes".to_string(),
        ])
    }

    const ARTIFACT: &str = r#"{
        "intercept": 5000.0,
        "features": [
            { "column": "sup_total", "center": 100.0, "scale": 50.0, "weight": 1000.0 },
            { "column": "dormitorios", "center": 2.0, "scale": 1.0, "weight": 300.0 }
        ],
        "comuna_offsets": { "Ñuñoa": 800.0, "La Pintana": -1500.0 }
    }"#;

    #[test]
    fn test_linear_prediction() {
        let model = LinearPricePredictor::from_json(ARTIFACT, &schema()).unwrap();
        let row = FeatureRow::from_values(vec![150.0, 3.0, 42.0]);

        // 5000 + 1000 * 1 + 300 * 1 + 800
        assert_eq!(model.predict(&row, "nunoa").unwrap(), 7100.0);
        assert_eq!(model.predict(&row, "la pintana").unwrap(), 4800.0);
    }

    #[test]
    fn test_unknown_comuna_contributes_nothing() {
        let model = LinearPricePredictor::from_json(ARTIFACT, &schema()).unwrap();
        let row = FeatureRow::from_values(vec![100.0, 2.0, 0.0]);
        assert_eq!(model.predict(&row, "isla de pascua").unwrap(), 5000.0);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let json = r#"{"intercept": 1.0, "features": [
            { "column": "piscina_olimpica", "center": 0.0, "scale": 1.0, "weight": 1.0 }
        ]}"#;
        let err = LinearPricePredictor::from_json(json, &schema()).unwrap_err();
        assert!(matches!(err, Error::Model(_)));
        assert!(err.to_string().contains("piscina_olimpica"));
    }

    #[test]
    fn test_zero_scale_rejected() {
        let json = r#"{"intercept": 1.0, "features": [
            { "column": "sup_total", "center": 0.0, "scale": 0.0, "weight": 1.0 }
        ]}"#;
        assert!(LinearPricePredictor::from_json(json, &schema()).is_err());
    }

    #[test]
    fn test_duplicate_normalized_comuna_rejected() {
        let json = r#"{"intercept": 1.0, "features": [],
            "comuna_offsets": { "Ñuñoa": 1.0, "nunoa": 2.0 }}"#;
        assert!(LinearPricePredictor::from_json(json, &schema()).is_err());
    }

    #[test]
    fn test_row_length_checked() {
        let model = LinearPricePredictor::from_json(ARTIFACT, &schema()).unwrap();
        let row = FeatureRow::from_values(vec![1.0]);
        assert!(matches!(model.predict(&row, "nunoa"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_missing_file_is_model_error() {
        let result = LinearPricePredictor::load(Path::new("/nonexistent/model.json"), &schema());
        assert!(matches!(result, Err(Error::Model(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(LinearPricePredictor::from_json("{", &schema()).is_err());
    }
}
