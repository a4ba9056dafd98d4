use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Pipeline settings, one JSON object per section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub file_names: FileNamesConfig,
    pub basic_info: BasicInfoConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub find_spots: FindSpotsConfig,
    #[serde(default)]
    pub stitch: StitchConfig,
    #[serde(default)]
    pub call_spots: CallSpotsConfig,
    #[serde(default)]
    pub omp: OmpConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

/// Relative paths are resolved against the directory of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNamesConfig {
    pub notebook_dir: PathBuf,
    pub tile_dir: PathBuf,
    /// File name of a tile stack; `{t}` is replaced by the tile index.
    #[serde(default = "default_tile_pattern")]
    pub tile_pattern: String,
    pub code_book: PathBuf,
    #[serde(default)]
    pub initial_bleed_matrix: Option<PathBuf>,
    #[serde(default)]
    pub transforms: Option<PathBuf>,
    #[serde(default)]
    pub tile_origins: Option<PathBuf>,
    /// Defaults to `<notebook_dir>/filtered`.
    #[serde(default)]
    pub filtered_dir: Option<PathBuf>,
    /// Defaults to `<notebook_dir>/output`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_tile_pattern() -> String {
    "tile_{t}.bin".to_string()
}

impl FileNamesConfig {
    pub fn tile_path(&self, t: usize) -> PathBuf {
        self.tile_dir
            .join(self.tile_pattern.replace("{t}", &t.to_string()))
    }

    pub fn filtered_dir(&self) -> PathBuf {
        self.filtered_dir
            .clone()
            .unwrap_or_else(|| self.notebook_dir.join("filtered"))
    }

    pub fn filtered_tile_path(&self, t: usize) -> PathBuf {
        self.filtered_dir().join(format!("tile_{}.bin", t))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.notebook_dir.join("output"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfoConfig {
    pub n_tiles: usize,
    pub n_rounds: usize,
    pub n_channels: usize,
    /// `None` uses every tile, round or channel.
    #[serde(default)]
    pub use_tiles: Option<Vec<usize>>,
    #[serde(default)]
    pub use_rounds: Option<Vec<usize>>,
    #[serde(default)]
    pub use_channels: Option<Vec<usize>>,
    #[serde(default)]
    pub anchor_channel: Option<usize>,
    #[serde(default)]
    pub dapi_channel: Option<usize>,
    #[serde(default = "default_pixel_size_xy")]
    pub pixel_size_xy: f32,
    #[serde(default = "default_pixel_size_z")]
    pub pixel_size_z: f32,
    #[serde(default)]
    pub bad_trc: Vec<[usize; 3]>,
}

fn default_pixel_size_xy() -> f32 {
    0.26
}

fn default_pixel_size_z() -> f32 {
    0.9
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Inner radius of the difference of hanning filter; `None` disables it.
    pub r1: Option<usize>,
    /// Outer radius, `2 * r1` when absent.
    pub r2: Option<usize>,
    /// Radius of the DAPI top-hat disk; `None` disables it.
    pub r_dapi: Option<usize>,
    pub auto_thresh_multiplier: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            r1: None,
            r2: None,
            r_dapi: None,
            auto_thresh_multiplier: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FindSpotsConfig {
    pub radius_xy: usize,
    pub radius_z: usize,
    pub isolation_radius_xy: f32,
    pub isolation_radius_z: f32,
    /// Keeps at most this many of the brightest spots per z plane.
    pub max_spots_per_z: usize,
}

impl Default for FindSpotsConfig {
    fn default() -> Self {
        Self {
            radius_xy: 2,
            radius_z: 2,
            isolation_radius_xy: 4.0,
            isolation_radius_z: 2.0,
            max_spots_per_z: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Explicit origins, `null` for tiles not imaged.
    pub tile_origins: Option<Vec<Option<[f32; 3]>>>,
    /// Grid position `[y, x]` of every tile, used when no origins are given.
    pub tile_pos_yx: Option<Vec<[usize; 2]>>,
    pub expected_overlap: f32,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            tile_origins: None,
            tile_pos_yx: None,
            expected_overlap: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallSpotsConfig {
    pub norm_cutoff_percentile: f32,
    pub norm_num_spots: usize,
    /// Number of z planes around the centre used for pixel normalisation.
    pub norm_z_planes: usize,
    pub dot_product_norm_shift: f32,
    pub bleed_matrix_score_thresh: f32,
    pub bleed_matrix_min_spots: usize,
    pub gene_efficiency_min_spots: usize,
    pub gene_efficiency_score_thresh: f32,
    pub gene_efficiency_intensity_thresh: f32,
    pub gene_efficiency_method: GeneEfficiencyMethod,
    /// Least-squares only: spots with a relative round strength at or above
    /// this are dropped. Unbounded when absent.
    pub gene_efficiency_max: Option<f32>,
    /// Least-squares only: a spot may have at most
    /// `ceil(gene_efficiency_min_factor * n_rounds)` rounds below this.
    pub gene_efficiency_min: f32,
    pub gene_efficiency_min_factor: f32,
}

/// How gene efficiency is estimated from confidently assigned spots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneEfficiencyMethod {
    /// Median scale between each round and the bled code.
    #[default]
    MedianScale,
    /// Round strengths by least squares against the dyes, relative to the
    /// gene's median round.
    LeastSquares,
}

impl Default for CallSpotsConfig {
    fn default() -> Self {
        Self {
            norm_cutoff_percentile: 75.0,
            norm_num_spots: 100,
            norm_z_planes: 1,
            dot_product_norm_shift: 0.0,
            bleed_matrix_score_thresh: 0.6,
            bleed_matrix_min_spots: 10,
            gene_efficiency_min_spots: 25,
            gene_efficiency_score_thresh: 0.6,
            gene_efficiency_intensity_thresh: 0.0,
            gene_efficiency_method: GeneEfficiencyMethod::MedianScale,
            gene_efficiency_max: None,
            gene_efficiency_min: 0.0,
            gene_efficiency_min_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OmpConfig {
    pub max_genes: usize,
    pub dp_thresh: f32,
    pub alpha: f32,
    pub beta: f32,
    pub weight_coef_fit: bool,
    pub fit_background: bool,
    pub colour_normalise: bool,
    pub subset_pixels: usize,
    pub shape_coefficient_threshold: f32,
    pub shape_isolation_distance_yx: usize,
    /// Derived from the yx distance and pixel sizes when absent.
    pub shape_isolation_distance_z: Option<usize>,
    pub spot_shape_max_spots: usize,
    pub spot_shape: [usize; 3],
    pub shape_sign_thresh: f32,
    pub high_coef_bias: f32,
    pub score_threshold: f32,
    pub radius_xy: usize,
    pub radius_z: usize,
}

impl Default for OmpConfig {
    fn default() -> Self {
        Self {
            max_genes: 10,
            dp_thresh: 0.225,
            alpha: 120.0,
            beta: 1.0,
            weight_coef_fit: true,
            fit_background: true,
            colour_normalise: true,
            subset_pixels: 10_000,
            shape_coefficient_threshold: 0.8,
            shape_isolation_distance_yx: 10,
            shape_isolation_distance_z: None,
            spot_shape_max_spots: 5000,
            spot_shape: [9, 9, 5],
            shape_sign_thresh: 0.1,
            high_coef_bias: 0.35,
            score_threshold: 0.1,
            radius_xy: 3,
            radius_z: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub score_ref: f32,
    pub score_omp: f32,
    pub intensity: f32,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            score_ref: 0.25,
            score_omp: 0.15,
            intensity: 0.15,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.file_names.resolve_relative(base);
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        fs::write(path, text).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Every section with defaults filled in, keyed by section name.
    pub fn section_values(&self) -> BTreeMap<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.basic_info;
        if b.n_tiles == 0 || b.n_rounds == 0 || b.n_channels == 0 {
            return Err(ConfigError::Invalid(
                "n_tiles, n_rounds and n_channels must be positive".to_string(),
            ));
        }
        check_use_list("use_tiles", b.use_tiles.as_deref(), b.n_tiles)?;
        check_use_list("use_rounds", b.use_rounds.as_deref(), b.n_rounds)?;
        check_use_list("use_channels", b.use_channels.as_deref(), b.n_channels)?;
        if let Some(c) = b.anchor_channel {
            if c >= b.n_channels {
                return Err(ConfigError::Invalid(format!(
                    "anchor_channel {} outside {} channels",
                    c, b.n_channels
                )));
            }
        }
        if let Some(c) = b.dapi_channel {
            if c >= b.n_channels {
                return Err(ConfigError::Invalid(format!(
                    "dapi_channel {} outside {} channels",
                    c, b.n_channels
                )));
            }
            if b.use_channels.as_ref().is_some_and(|u| u.contains(&c)) {
                return Err(ConfigError::Invalid(format!(
                    "dapi_channel {} cannot be a sequencing channel",
                    c
                )));
            }
        }
        for trc in &b.bad_trc {
            if trc[0] >= b.n_tiles || trc[1] > b.n_rounds || trc[2] >= b.n_channels {
                return Err(ConfigError::Invalid(format!("bad_trc {:?} out of range", trc)));
            }
        }

        if let (Some(r1), r2) = (self.filter.r1, self.filter.r2) {
            if r1 == 0 || r2.is_some_and(|r2| r2 <= r1) {
                return Err(ConfigError::Invalid(
                    "filter radii must satisfy 0 < r1 < r2".to_string(),
                ));
            }
        }
        if self.filter.auto_thresh_multiplier <= 0.0 {
            return Err(ConfigError::Invalid(
                "auto_thresh_multiplier must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.stitch.expected_overlap) {
            return Err(ConfigError::Invalid(
                "expected_overlap must be in [0, 1)".to_string(),
            ));
        }

        let cs = &self.call_spots;
        if cs.gene_efficiency_min_factor < 0.0
            || cs.gene_efficiency_max.is_some_and(|m| m <= cs.gene_efficiency_min)
        {
            return Err(ConfigError::Invalid(
                "gene efficiency limits need min_factor >= 0 and max > min".to_string(),
            ));
        }

        let omp = &self.omp;
        if omp.spot_shape.iter().any(|s| s % 2 == 0) {
            return Err(ConfigError::Invalid(format!(
                "omp spot_shape {:?} must be odd in every dimension",
                omp.spot_shape
            )));
        }
        if omp.max_genes == 0 || omp.subset_pixels == 0 {
            return Err(ConfigError::Invalid(
                "omp max_genes and subset_pixels must be positive".to_string(),
            ));
        }
        if omp.high_coef_bias < 0.0 || omp.beta <= 0.0 || omp.alpha < 0.0 {
            return Err(ConfigError::Invalid(
                "omp requires alpha >= 0, beta > 0 and high_coef_bias >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl FileNamesConfig {
    fn resolve_relative(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        fix(&mut self.notebook_dir);
        fix(&mut self.tile_dir);
        fix(&mut self.code_book);
        for p in [
            &mut self.initial_bleed_matrix,
            &mut self.transforms,
            &mut self.tile_origins,
            &mut self.filtered_dir,
            &mut self.output_dir,
        ]
        .into_iter()
        .flatten()
        {
            fix(p);
        }
    }
}

fn check_use_list(name: &str, list: Option<&[usize]>, n: usize) -> Result<(), ConfigError> {
    let Some(list) = list else {
        return Ok(());
    };
    if list.is_empty() {
        return Err(ConfigError::Invalid(format!("{} is empty", name)));
    }
    if let Some(bad) = list.iter().find(|&&v| v >= n) {
        return Err(ConfigError::Invalid(format!(
            "{} contains {} but only {} exist",
            name, bad, n
        )));
    }
    let mut sorted = list.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != list.len() {
        return Err(ConfigError::Invalid(format!("{} has duplicates", name)));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/src_inline/config.rs"]
mod tests;
