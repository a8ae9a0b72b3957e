//! Shared API request/response types
//!
//! Rust field names are English; the JSON wire names stay the Spanish ones
//! the existing frontend already reads (`precio_estimado_uf`, `similares`, ...).

use serde::{Deserialize, Deserializer, Serialize};

use crate::normalize::normalize_comuna;
use crate::{Error, Result};

/// Floor count used when the request omits `pisos` or sends null
pub const DEFAULT_FLOORS: i64 = 1;

/// Local segment name reported for a comuna without a curated entry
pub const UNDEFINED_SEGMENT: &str = "undefined";

// ========================================
// Request Types
// ========================================

/// Property description submitted for valuation (`PropiedadInput`)
///
/// Unknown fields are rejected. Optional fields accept an explicit `null`,
/// which means the same as leaving them out.
///
/// # Examples
///
/// ```
/// use sicop_common::api::types::PropertyInput;
///
/// let input: PropertyInput = serde_json::from_str(r#"{
///     "sup_total": 80.0, "sup_construida": 70.0, "dormitorios": 2,
///     "banos": 2, "estacionamientos": 1, "antiguedad": 5, "comuna": "Ñuñoa"
/// }"#).unwrap();
///
/// assert_eq!(input.floors, 1);
/// assert!(!input.pool);
/// assert_eq!(input.comuna_key(), "nunoa");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyInput {
    /// Total lot/unit area (m²)
    #[serde(rename = "sup_total")]
    pub total_area: f64,

    /// Built area (m²)
    #[serde(rename = "sup_construida")]
    pub built_area: f64,

    #[serde(rename = "dormitorios")]
    pub bedrooms: i64,

    #[serde(rename = "banos")]
    pub bathrooms: i64,

    #[serde(rename = "estacionamientos")]
    pub parking_spots: i64,

    /// Age in years
    #[serde(rename = "antiguedad")]
    pub age_years: i64,

    /// Raw comuna name as typed by the user
    pub comuna: String,

    #[serde(rename = "bodegas", default, deserialize_with = "null_as_default")]
    pub storage_rooms: i64,

    #[serde(
        rename = "pisos",
        default = "default_floors",
        deserialize_with = "null_as_default_floors"
    )]
    pub floors: i64,

    #[serde(rename = "terraza", default, deserialize_with = "null_as_default")]
    pub terrace: bool,

    #[serde(rename = "piscina", default, deserialize_with = "null_as_default")]
    pub pool: bool,

    #[serde(rename = "aire_acondicionado", default, deserialize_with = "null_as_default")]
    pub air_conditioning: bool,

    #[serde(rename = "closets_empotrados", default, deserialize_with = "null_as_default")]
    pub built_in_closets: bool,
}

fn default_floors() -> i64 {
    DEFAULT_FLOORS
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_floors<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(DEFAULT_FLOORS))
}

impl PropertyInput {
    /// Normalized comuna key used for every join and lookup
    pub fn comuna_key(&self) -> String {
        normalize_comuna(&self.comuna)
    }

    /// Check the value ranges serde cannot express
    ///
    /// A blank comuna is a schema error; out-of-range numbers are invalid input.
    pub fn validate(&self) -> Result<()> {
        if self.comuna_key().is_empty() {
            return Err(Error::Schema("comuna must not be empty".to_string()));
        }

        for (field, value) in [
            ("sup_total", self.total_area),
            ("sup_construida", self.built_area),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "{} must be a finite, non-negative number (got {})",
                    field, value
                )));
            }
        }

        for (field, value) in [
            ("dormitorios", self.bedrooms),
            ("banos", self.bathrooms),
            ("estacionamientos", self.parking_spots),
            ("antiguedad", self.age_years),
            ("bodegas", self.storage_rooms),
        ] {
            if value < 0 {
                return Err(Error::InvalidInput(format!(
                    "{} must not be negative (got {})",
                    field, value
                )));
            }
        }

        if self.floors < 1 {
            return Err(Error::InvalidInput(format!(
                "pisos must be at least 1 (got {})",
                self.floors
            )));
        }

        Ok(())
    }
}

// ========================================
// Response Types
// ========================================

/// `POST /predict` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateResponse {
    /// Blended price (model + similar properties)
    #[serde(rename = "precio_estimado_uf")]
    pub adjusted_price: f64,

    /// Model prediction clamped to the dataset price range
    #[serde(rename = "precio_modelo_uf")]
    pub model_price: f64,

    #[serde(rename = "k_usado_para_ajuste")]
    pub k_used: usize,

    #[serde(rename = "propiedad_entrada")]
    pub input: PropertyInput,
}

/// `POST /similar` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarResponse {
    #[serde(rename = "precio_estimado_uf")]
    pub adjusted_price: f64,

    #[serde(rename = "precio_modelo_uf")]
    pub model_price: f64,

    pub k: usize,

    #[serde(rename = "propiedad_entrada")]
    pub input: PropertyInput,

    /// Nearest properties, closest first
    #[serde(rename = "similares")]
    pub matches: Vec<SimilarMatch>,
}

/// One nearest-neighbour hit, with the dataset's original (unscaled) values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarMatch {
    #[serde(rename = "id_propiedad")]
    pub property_id: usize,

    #[serde(rename = "sup_total")]
    pub total_area: Option<f64>,

    #[serde(rename = "sup_construida")]
    pub built_area: Option<f64>,

    #[serde(rename = "dormitorios")]
    pub bedrooms: Option<i64>,

    #[serde(rename = "banos")]
    pub bathrooms: Option<i64>,

    #[serde(rename = "estacionamientos")]
    pub parking_spots: Option<i64>,

    pub comuna: String,

    #[serde(rename = "precio_en_uf")]
    pub price: f64,

    /// Euclidean distance in the standardized feature space
    #[serde(rename = "distancia")]
    pub distance: f64,

    /// Listing URL, empty when the dataset has none
    #[serde(rename = "url_portal")]
    pub url: String,

    /// Curated local segment of the matched property's comuna
    #[serde(
        rename = "segmento_nombre",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub segment_name: Option<String>,
}

/// `POST /segmento` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResponse {
    /// Clamped model prediction (no neighbour blending on this route)
    #[serde(rename = "precio_estimado_uf")]
    pub model_price: f64,

    #[serde(rename = "segmento_global")]
    pub global: GlobalSegment,

    #[serde(rename = "segmento_local")]
    pub local: LocalSegment,

    #[serde(rename = "propiedad_entrada")]
    pub input: PropertyInput,
}

/// Data-derived market tier (k-means cluster) plus that cluster's statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSegment {
    pub cluster: usize,

    #[serde(rename = "nombre_segmento")]
    pub label: String,

    #[serde(rename = "n_propiedades")]
    pub member_count: usize,

    #[serde(rename = "promedio_uf")]
    pub mean_price: f64,

    #[serde(rename = "promedio_sup_total")]
    pub mean_total_area: Option<f64>,

    #[serde(rename = "promedio_dormitorios")]
    pub mean_bedrooms: Option<f64>,
}

/// Curated comuna segment plus statistics computed from the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSegment {
    /// Curated display name, or the raw query comuna when uncurated
    pub comuna: String,

    #[serde(rename = "segmento_codigo")]
    pub segment_code: Option<i64>,

    #[serde(rename = "segmento_nombre")]
    pub segment_name: String,

    #[serde(rename = "n_propiedades_comuna")]
    pub member_count: usize,

    #[serde(rename = "precio_promedio_comuna")]
    pub mean_price: Option<f64>,

    #[serde(rename = "sup_promedio_comuna")]
    pub mean_total_area: Option<f64>,

    #[serde(rename = "dormitorios_promedio_comuna")]
    pub mean_bedrooms: Option<f64>,
}

// ========================================
// Tests
// ========================================
