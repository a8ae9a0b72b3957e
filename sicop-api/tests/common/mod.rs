//! Shared fixtures: a small Santiago dataset, curated segments and a linear model
//! written into a temporary data folder.

#![allow(dead_code)]

use sicop_api::ValuationEngine;
use sicop_common::config::{DataFiles, TomlConfig};
use std::fs;
use tempfile::TempDir;

pub const DATASET_CSV: &str = "\
id_propiedad,precio_en_uf,comuna,sup_total,sup_construida,dormitorios,banos,estacionamientos,antiguedad,pisos,amb_terraza,amb_piscina,srv_aire_acondicionado,amb_closets,bodegas,link
101,3000,Puente Alto,60,50,2,1,0,20,1,0,0,0,0,0,https://portal.example/0
102,3400,Puente Alto,70,55,2,1,1,18,1,0,0,0,1,0,
103,5200,nunoa,85,70,3,2,1,10,1,1,0,0,1,1,https://portal.example/2
104,6100,Ñuñoa,95,80,3,2,1,8,1,1,0,1,1,1,https://portal.example/3
105,5800,ÑUÑOA ,90,78,3,2,1,12,1,0,0,0,1,0,
106,12000,Las Condes,180,150,4,3,2,5,2,1,1,1,1,1,https://portal.example/5
107,14500,Las Condes,220,170,5,4,2,3,2,1,1,1,1,1,
108,9000,Providencia,120,100,3,3,1,15,1,1,0,1,1,1,
";

pub const SEGMENTS_CSV: &str = "\
comuna,segmento_codigo,segmento_nombre
Ñuñoa,3,Medio-alto
Las Condes,4,Alto
Vitacura,4,Alto
";

pub const MODEL_JSON: &str = r#"{
    "intercept": 6000.0,
    "features": [
        { "column": "sup_total", "center": 110.0, "scale": 50.0, "weight": 2500.0 },
        { "column": "dormitorios", "center": 3.0, "scale": 1.0, "weight": 500.0 }
    ],
    "comuna_offsets": { "Las Condes": 2000.0, "Puente Alto": -1500.0 }
}"#;

/// Temporary data folder holding the three input files under their default names
pub struct Fixture {
    pub dir: TempDir,
    pub config: TomlConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_files(DATASET_CSV, SEGMENTS_CSV, MODEL_JSON)
    }

    pub fn with_files(dataset: &str, segments: &str, model: &str) -> Self {
        let dir = TempDir::new().expect("Should create temp dir");
        let config = TomlConfig::default();
        let files = config.data.resolve(dir.path());
        fs::write(&files.dataset, dataset).expect("Should write dataset");
        fs::write(&files.segments, segments).expect("Should write segments");
        fs::write(&files.model, model).expect("Should write model");
        Self { dir, config }
    }

    pub fn files(&self) -> DataFiles {
        self.config.data.resolve(self.dir.path())
    }

    pub fn engine(&self) -> ValuationEngine {
        ValuationEngine::load(&self.files(), &self.config).expect("Should build engine")
    }
}
