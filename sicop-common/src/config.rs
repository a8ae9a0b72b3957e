//! Configuration loading and data folder resolution
//!
//! Bootstrap configuration comes from a single TOML file. Every key is
//! optional; missing keys fall back to the built-in defaults below.
//!
//! # Resolution priority
//!
//! Config file:
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`SICOP_CONFIG`)
//! 3. `~/.config/sicop/config.toml`, then `/etc/sicop/config.toml`
//! 4. Built-in defaults (no file)
//!
//! Data folder:
//! 1. Command-line argument (`--data-dir`)
//! 2. Environment variable (`SICOP_DATA_DIR`)
//! 3. TOML `data_dir`
//! 4. OS-dependent compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SICOP_CONFIG";

/// Environment variable naming the data folder
pub const DATA_DIR_ENV_VAR: &str = "SICOP_DATA_DIR";

/// Business-tier labels assigned to clusters in ascending mean-price order
pub const DEFAULT_TIER_LABELS: [&str; 4] = [
    "Segmento Económico",
    "Segmento Medio-bajo",
    "Segmento Medio-alto",
    "Segmento Alto",
];

/// Bootstrap configuration loaded from TOML
///
/// Read once at startup; the service must restart to pick up changes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Base folder for relative data file paths
    pub data_dir: Option<PathBuf>,
    pub server: ServerConfig,
    pub data: DataFiles,
    pub valuation: ValuationConfig,
    pub clustering: ClusteringConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// Input files, relative to the data folder unless absolute
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataFiles {
    /// Property dataset (CSV)
    pub dataset: PathBuf,
    /// Curated comuna → segment table (CSV)
    pub segments: PathBuf,
    /// Regression model artifact (JSON)
    pub model: PathBuf,
}

impl Default for DataFiles {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("inmobiliario.csv"),
            segments: PathBuf::from("segmento_por_comuna.csv"),
            model: PathBuf::from("modelo_inmobiliario.json"),
        }
    }
}

impl DataFiles {
    /// Anchor relative paths at `data_dir`
    pub fn resolve(&self, data_dir: &Path) -> DataFiles {
        let anchor = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                data_dir.join(p)
            }
        };
        DataFiles {
            dataset: anchor(&self.dataset),
            segments: anchor(&self.segments),
            model: anchor(&self.model),
        }
    }
}

/// Price blending and similarity search policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    /// Neighbour count used by `/predict` and by `/similar` without `k`
    pub default_k: usize,
    /// Largest `k` a caller may request
    pub max_k: usize,
    /// Weight of the clamped model price; neighbours get `1 - model_weight`
    pub model_weight: f64,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            max_k: 100,
            model_weight: 0.3,
        }
    }
}

/// Global segmentation (k-means) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub n_clusters: usize,
    /// Base seed; run `i` is seeded with `seed + i`
    pub seed: u64,
    /// Independent k-means++ restarts, best inertia wins
    pub n_init: usize,
    pub max_iter: usize,
    /// Stop once no centroid moves farther than this
    pub tolerance: f64,
    pub tier_labels: Vec<String>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            n_clusters: 4,
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            tier_labels: DEFAULT_TIER_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let v = &self.valuation;
        if !(0.0..=1.0).contains(&v.model_weight) {
            return Err(Error::Config(format!(
                "valuation.model_weight must be within [0, 1] (got {})",
                v.model_weight
            )));
        }
        if v.default_k == 0 {
            return Err(Error::Config("valuation.default_k must be at least 1".to_string()));
        }
        if v.default_k > v.max_k {
            return Err(Error::Config(format!(
                "valuation.default_k ({}) exceeds valuation.max_k ({})",
                v.default_k, v.max_k
            )));
        }

        let c = &self.clustering;
        if c.n_clusters == 0 {
            return Err(Error::Config("clustering.n_clusters must be at least 1".to_string()));
        }
        if c.n_init == 0 {
            return Err(Error::Config("clustering.n_init must be at least 1".to_string()));
        }
        if c.max_iter == 0 {
            return Err(Error::Config("clustering.max_iter must be at least 1".to_string()));
        }
        if !c.tolerance.is_finite() || c.tolerance <= 0.0 {
            return Err(Error::Config(format!(
                "clustering.tolerance must be a positive number (got {})",
                c.tolerance
            )));
        }
        Ok(())
    }
}

/// Locate the config file, if any
///
/// An explicitly named file (CLI or environment) must exist; the per-user and
/// system locations are optional.
pub fn resolve_config_file(cli_arg: Option<&Path>) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_file(path.to_path_buf(), "--config");
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return require_file(PathBuf::from(path), CONFIG_ENV_VAR);
        }
    }

    // Priority 3: Well-known locations
    let user_config = dirs::config_dir().map(|d| d.join("sicop").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(Some(path));
        }
    }
    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/sicop/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }
    }

    // Priority 4: none, use built-in defaults
    Ok(None)
}

fn require_file(path: PathBuf, source: &str) -> Result<Option<PathBuf>> {
    if path.is_file() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!(
            "Config file from {} not found: {}",
            source,
            path.display()
        )))
    }
}

/// Resolve and load the configuration, falling back to defaults when no file exists
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_file(cli_arg)? {
        Some(path) => {
            let config = TomlConfig::load(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Data folder resolution (CLI > environment > TOML > compiled default)
pub fn resolve_data_dir(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(DATA_DIR_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.data_dir {
        return path.clone();
    }

    get_default_data_dir()
}

/// OS-dependent default data folder
pub fn get_default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/sicop (or /var/lib/sicop for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("sicop"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/sicop"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("sicop"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/sicop"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("sicop"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\sicop"))
    } else {
        PathBuf::from("./sicop_data")
    }
}
