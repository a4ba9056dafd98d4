//! Synthetic experiments with known spot positions and genes.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::info;

use crate::config::{
    BasicInfoConfig, Config, ConfigError, FileNamesConfig, OmpConfig, StitchConfig,
};
use crate::input::InputError;
use crate::input::codebook::write_codebook;
use crate::input::codes::reed_solomon_codes;
use crate::input::tile_bin::write_tile_stack;
use crate::model::{GeneCodes, Image3d};

pub const CONFIG_FILE: &str = "config.json";
pub const CODEBOOK_FILE: &str = "codebook.txt";
pub const BLEED_MATRIX_FILE: &str = "bleed_matrix.json";

#[derive(Debug, Error)]
pub enum SimulateError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not place {0} spots with the requested separation")]
    Crowded(usize),
}

#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub n_tiles: usize,
    pub n_genes: usize,
    pub n_rounds: usize,
    pub n_channels: usize,
    pub tile_sz: usize,
    pub nz: usize,
    pub spots_per_tile: usize,
    /// Minimum yx distance between spot centres of one tile.
    pub min_separation: f32,
    pub amplitude: f32,
    pub sigma_xy: f32,
    pub sigma_z: f32,
    /// Fraction of each dye leaking into the next channel.
    pub cross_talk: f32,
    /// Mean of the smooth background shared by every round.
    pub background: f32,
    pub noise_sd: f32,
    pub seed: u64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            n_tiles: 2,
            n_genes: 4,
            n_rounds: 3,
            n_channels: 3,
            tile_sz: 48,
            nz: 5,
            spots_per_tile: 14,
            min_separation: 8.0,
            amplitude: 200.0,
            sigma_xy: 1.0,
            sigma_z: 0.7,
            cross_talk: 0.15,
            background: 2.0,
            noise_sd: 0.5,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSpot {
    pub tile: usize,
    pub local_yxz: [i32; 3],
    pub gene: usize,
}

#[derive(Debug, Clone)]
pub struct GroundTruth {
    pub config_path: PathBuf,
    pub gene_codes: GeneCodes,
    /// `[dye][channel]`.
    pub bleed_matrix: Vec<Vec<f32>>,
    pub spots: Vec<SimulatedSpot>,
}

/// Dye `d` is channel `d` plus `cross_talk` of the next channel.
pub fn cross_talk_bleed_matrix(n_channels: usize, cross_talk: f32) -> Vec<Vec<f32>> {
    (0..n_channels)
        .map(|d| {
            (0..n_channels)
                .map(|c| {
                    if c == d {
                        1.0
                    } else if c == (d + 1) % n_channels {
                        cross_talk
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Standard normal sample by the Box-Muller transform.
fn normal(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
}

fn place_spots(
    rng: &mut StdRng,
    options: &SimulationOptions,
    tile: usize,
) -> Result<Vec<SimulatedSpot>, SimulateError> {
    let margin = 3usize;
    let (lo, hi) = (margin, options.tile_sz.saturating_sub(margin));
    let mut spots: Vec<SimulatedSpot> = Vec::with_capacity(options.spots_per_tile);
    let mut attempts = 0;
    while spots.len() < options.spots_per_tile {
        attempts += 1;
        if attempts > 10_000 || lo >= hi {
            return Err(SimulateError::Crowded(options.spots_per_tile));
        }
        let y = rng.gen_range(lo..hi) as i32;
        let x = rng.gen_range(lo..hi) as i32;
        let z = if options.nz > 2 {
            rng.gen_range(1..options.nz - 1) as i32
        } else {
            0
        };
        let clear = spots.iter().all(|s| {
            let dy = (s.local_yxz[0] - y) as f32;
            let dx = (s.local_yxz[1] - x) as f32;
            (dy * dy + dx * dx).sqrt() >= options.min_separation
        });
        if clear {
            spots.push(SimulatedSpot {
                tile,
                local_yxz: [y, x, z],
                gene: spots.len() % options.n_genes,
            });
        }
    }
    Ok(spots)
}

/// Adds a Gaussian spot of peak `amplitude` centred on `centre`.
fn paint(image: &mut Image3d, centre: [i32; 3], amplitude: f32, sigma_xy: f32, sigma_z: f32) {
    let reach_xy = (3.0 * sigma_xy).ceil() as i32;
    let reach_z = (3.0 * sigma_z).ceil() as i32;
    for dy in -reach_xy..=reach_xy {
        for dx in -reach_xy..=reach_xy {
            for dz in -reach_z..=reach_z {
                let p = [centre[0] + dy, centre[1] + dx, centre[2] + dz];
                if !image.contains(p) {
                    continue;
                }
                let r2 = (dy * dy + dx * dx) as f32 / (2.0 * sigma_xy * sigma_xy)
                    + (dz * dz) as f32 / (2.0 * sigma_z * sigma_z);
                let (y, x, z) = (p[0] as usize, p[1] as usize, p[2] as usize);
                let v = image.get(y, x, z);
                image.set(y, x, z, v + amplitude * (-r2).exp());
            }
        }
    }
}

/// Background shared by every image of a tile; rounds stay correlated.
fn smooth_background(options: &SimulationOptions) -> Image3d {
    let (n, nz) = (options.tile_sz, options.nz);
    let mut image = Image3d::zeros(n, n, nz);
    for y in 0..n {
        for x in 0..n {
            let v = options.background
                * (1.0 + 0.5 * (y as f32 / 5.0).sin() * (x as f32 / 7.0).cos());
            for z in 0..nz {
                image.set(y, x, z, v);
            }
        }
    }
    image
}

/// Images `[round][channel]` of one tile, the anchor round last.
fn tile_images(
    rng: &mut StdRng,
    options: &SimulationOptions,
    spots: &[SimulatedSpot],
    codes: &GeneCodes,
    bleed: &[Vec<f32>],
    anchor_channel: usize,
) -> Vec<Vec<Image3d>> {
    let background = smooth_background(options);
    let mut images = vec![vec![background; options.n_channels]; options.n_rounds + 1];
    for spot in spots {
        let code = &codes.codes[spot.gene];
        for (r, round) in images.iter_mut().take(options.n_rounds).enumerate() {
            let dye = code[r] as usize;
            for (c, image) in round.iter_mut().enumerate() {
                let amp = options.amplitude * bleed[dye][c];
                if amp > 0.0 {
                    paint(image, spot.local_yxz, amp, options.sigma_xy, options.sigma_z);
                }
            }
        }
        paint(
            &mut images[options.n_rounds][anchor_channel],
            spot.local_yxz,
            options.amplitude,
            options.sigma_xy,
            options.sigma_z,
        );
    }
    for image in images.iter_mut().flatten() {
        for v in image.data.iter_mut() {
            *v = (*v + options.noise_sd * normal(rng)).max(0.0);
        }
    }
    images
}

/// Pipeline config for a simulated experiment with paths relative to `dir`.
pub fn simulation_config(options: &SimulationOptions) -> Config {
    let half = options.tile_sz / 2;
    Config {
        file_names: FileNamesConfig {
            notebook_dir: PathBuf::from("notebook"),
            tile_dir: PathBuf::from("tiles"),
            tile_pattern: "tile_{t}.bin".to_string(),
            code_book: PathBuf::from(CODEBOOK_FILE),
            initial_bleed_matrix: Some(PathBuf::from(BLEED_MATRIX_FILE)),
            transforms: None,
            tile_origins: None,
            filtered_dir: None,
            output_dir: None,
        },
        basic_info: BasicInfoConfig {
            n_tiles: options.n_tiles,
            n_rounds: options.n_rounds,
            n_channels: options.n_channels,
            use_tiles: None,
            use_rounds: None,
            use_channels: None,
            anchor_channel: Some(0),
            dapi_channel: None,
            pixel_size_xy: 0.26,
            pixel_size_z: 0.9,
            bad_trc: Vec::new(),
        },
        stitch: StitchConfig {
            tile_pos_yx: Some((0..options.n_tiles).map(|t| [0, t]).collect()),
            expected_overlap: 0.0,
            ..StitchConfig::default()
        },
        omp: OmpConfig {
            spot_shape: [7, 7, 3],
            shape_isolation_distance_yx: 4,
            shape_isolation_distance_z: Some(1),
            subset_pixels: half * half,
            ..OmpConfig::default()
        },
        filter: Default::default(),
        find_spots: Default::default(),
        call_spots: Default::default(),
        thresholds: Default::default(),
    }
}

/// Writes tiles, code book, bleed matrix and config into `dir`.
pub fn simulate(dir: &Path, options: &SimulationOptions) -> Result<GroundTruth, SimulateError> {
    fs::create_dir_all(dir).map_err(|source| SimulateError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let codes = reed_solomon_codes(options.n_genes, options.n_rounds, options.n_channels)?;
    let bleed = cross_talk_bleed_matrix(options.n_channels, options.cross_talk);
    let config = simulation_config(options);

    let mut spots = Vec::new();
    for t in 0..options.n_tiles {
        let tile_spots = place_spots(&mut rng, options, t)?;
        let images = tile_images(&mut rng, options, &tile_spots, &codes, &bleed, 0);
        let path = dir.join(&config.file_names.tile_dir).join(
            config
                .file_names
                .tile_pattern
                .replace("{t}", &t.to_string()),
        );
        write_tile_stack(&path, &images)?;
        spots.extend(tile_spots);
    }
    write_codebook(&dir.join(CODEBOOK_FILE), &codes)?;
    let bleed_path = dir.join(BLEED_MATRIX_FILE);
    let bleed_json = serde_json::to_string_pretty(&bleed).map_err(InputError::from)?;
    fs::write(&bleed_path, bleed_json).map_err(|source| SimulateError::Io {
        path: bleed_path.clone(),
        source,
    })?;
    let config_path = dir.join(CONFIG_FILE);
    config.save(&config_path)?;
    info!(
        dir = %dir.display(),
        n_tiles = options.n_tiles,
        n_spots = spots.len(),
        "wrote simulated experiment"
    );
    Ok(GroundTruth {
        config_path,
        gene_codes: codes,
        bleed_matrix: bleed,
        spots,
    })
}
