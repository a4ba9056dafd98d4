use super::*;

use super::background::{background_codes, fit_background};
use crate::call_spots::get_bled_codes;
use crate::input::codes::reed_solomon_codes;
use crate::model::BleedMatrix;

fn test_bled_codes() -> BledCodes {
    let codes = reed_solomon_codes(4, 3, 3).unwrap();
    let identity: Vec<Vec<f32>> = (0..3)
        .map(|d| (0..3).map(|c| if c == d { 1.0 } else { 0.0 }).collect())
        .collect();
    let bleed = BleedMatrix::from_dye_channel(&identity, 3).unwrap();
    get_bled_codes(&codes, &bleed, &[1.0; 12]).unwrap()
}

fn plain_options() -> CoefOptions {
    CoefOptions {
        max_genes: 3,
        dp_thresh: 0.225,
        norm_shift: 0.0,
        fit_background: false,
        weight_coef_fit: false,
        alpha: 120.0,
        beta: 1.0,
    }
}

#[test]
fn test_fit_background_removes_constant_channel() {
    let codes = background_codes(3, 2);
    assert!((simd::norm_f32(&codes[1]) - 1.0).abs() < 1e-6);
    let mut colour = vec![2.0, 0.0, 2.0, 1.0, 2.0, 0.0];
    let coefs = fit_background(&mut colour, &codes);
    assert!((coefs[0] - 2.0 * 3f32.sqrt()).abs() < 1e-5);
    for r in 0..3 {
        assert!(colour[r * 2].abs() < 1e-5);
    }
    assert!((colour[3] - 2.0 / 3.0).abs() < 1e-5);
}

#[test]
fn test_omp_single_gene() {
    let bled = test_bled_codes();
    let colour: Vec<f32> = bled.code(1).iter().map(|v| v * 3.0).collect();
    let bg = background_codes(3, 3);
    let coefs = coefs::pixel_coefficients(&colour, &bled, &bg, &plain_options());
    assert_eq!(coefs.len(), 1);
    assert_eq!(coefs[0].0, 1);
    assert!((coefs[0].1 - 3.0).abs() < 1e-4);
}

#[test]
fn test_omp_two_gene_mixture() {
    let bled = test_bled_codes();
    let colour: Vec<f32> = bled
        .code(0)
        .iter()
        .zip(bled.code(3))
        .map(|(a, b)| 2.0 * a + b)
        .collect();
    let bg = background_codes(3, 3);
    let coefs = coefs::pixel_coefficients(&colour, &bled, &bg, &plain_options());
    assert_eq!(coefs.len(), 2);
    assert_eq!((coefs[0].0, coefs[1].0), (0, 3));
    assert!((coefs[0].1 - 2.0).abs() < 1e-3);
    assert!((coefs[1].1 - 1.0).abs() < 1e-3);
}

#[test]
fn test_omp_threshold_and_weighting() {
    let bled = test_bled_codes();
    let bg = background_codes(3, 3);
    let mut options = plain_options();
    options.dp_thresh = 1.5;
    let colour: Vec<f32> = bled.code(2).to_vec();
    assert!(coefs::pixel_coefficients(&colour, &bled, &bg, &options).is_empty());

    let mut options = plain_options();
    options.weight_coef_fit = true;
    let coefs = coefs::pixel_coefficients(&colour, &bled, &bg, &options);
    assert_eq!(coefs[0].0, 2);
    assert!((coefs[0].1 - 1.0).abs() < 1e-3);
}

#[test]
fn test_coefficients_keep_input_order() {
    let bled = test_bled_codes();
    let mut colours = SpotColours::new(3, 3);
    for g in [3usize, 0, 2, 1, 3] {
        colours.push(bled.code(g));
    }
    let all = compute_omp_coefficients(&colours, &bled, &plain_options(), 2);
    let genes: Vec<usize> = all.iter().map(|p| p[0].0).collect();
    assert_eq!(genes, vec![3, 0, 2, 1, 3]);
}

#[test]
fn test_detect_spots_plateau_keeps_one() {
    let mut image = Image3d::zeros(5, 5, 1);
    image.set(2, 2, 0, 5.0);
    image.set(2, 3, 0, 5.0);
    image.set(0, 4, 0, 3.0);
    image.set(4, 0, 0, 0.5);
    let (yxz, values) = detect_spots(&image, 1.0, 1, 0).unwrap();
    assert_eq!(yxz, vec![[0, 4, 0], [2, 2, 0]]);
    assert_eq!(values, vec![3.0, 5.0]);
}

#[test]
fn test_isolated_and_per_z_limit() {
    let yxz = [[0, 0, 0], [0, 2, 0], [10, 10, 0], [5, 5, 1]];
    assert_eq!(isolated_spots(&yxz, 3.0, 1.0), vec![false, false, true, true]);

    let values = [1.0, 3.0, 2.0, 0.5];
    let (kept, kept_values) = limit_spots_per_z(&yxz, &values, 2);
    assert_eq!(kept, vec![[0, 2, 0], [10, 10, 0], [5, 5, 1]]);
    assert_eq!(kept_values, vec![3.0, 2.0, 0.5]);
}

#[test]
fn test_mean_spot_counts_outside_as_zero() {
    let mut image = Image3d::zeros(4, 4, 1);
    image.set(0, 0, 0, 4.0);
    image.set(2, 2, 0, 2.0);
    image.set(2, 3, 0, 1.0);
    let mean = compute_mean_spot_from(&image, &[[0, 0, 0], [2, 2, 0]], [3, 3, 1]);
    assert_eq!(mean.get(1, 1, 0), 3.0);
    assert_eq!(mean.get(1, 2, 0), 0.5);
    assert_eq!(mean.get(0, 0, 0), 0.0);
    assert_eq!(
        compute_mean_spot_from(&image, &[], [3, 3, 1]),
        Image3d::zeros(3, 3, 1)
    );
}

#[test]
fn test_spot_shape_helpers() {
    let ones = Image3d::from_vec(3, 3, 1, vec![1.0; 9]).unwrap();
    assert_eq!(count_edge_ones(&ones), 8);
    let mean = Image3d::from_vec(1, 1, 3, vec![0.05, 0.5, 0.1]).unwrap();
    assert_eq!(spot_from_mean(&mean, 0.1).data, vec![0.0, 1.0, 1.0]);
}

#[test]
fn test_score_coefficient_image() {
    let mut coefs = Image3d::zeros(5, 5, 1);
    coefs.set(2, 2, 0, 1.0);
    coefs.set(0, 0, 0, -4.0);
    let spot = Image3d::from_vec(3, 3, 1, vec![1.0; 9]).unwrap();
    let mean_spot = spot.clone();
    let scores = score_coefficient_image(&coefs, &spot, &mean_spot, 1.0);
    assert!((scores.get(2, 2, 0) - 0.5 / 9.0).abs() < 1e-6);
    assert!((scores.get(1, 1, 0) - 0.5 / 9.0).abs() < 1e-6);
    assert_eq!(scores.get(0, 0, 0), 0.0);
    assert_eq!(scores.get(4, 4, 0), 0.0);
}

struct MemorySource {
    /// Per tile, one image per `[round][channel]`.
    images: Vec<Vec<Image3d>>,
    n_rounds: usize,
    n_channels: usize,
}

impl ColourSource for MemorySource {
    fn colours(&self, tile: usize, yxz: &[[i32; 3]]) -> Result<SpotColours, OmpError> {
        let mut out = SpotColours::new(self.n_rounds, self.n_channels);
        for p in yxz {
            let colour: Vec<f32> = self.images[tile]
                .iter()
                .map(|im| im.get(p[0] as usize, p[1] as usize, p[2] as usize))
                .collect();
            out.push(&colour);
        }
        Ok(out)
    }
}

fn paint_spot(images: &mut [Image3d], code: &[f32], centre: [usize; 3]) {
    let [y, x, z] = centre;
    let taps = [
        ([y, x, z], 10.0),
        ([y - 1, x, z], 5.0),
        ([y + 1, x, z], 5.0),
        ([y, x - 1, z], 5.0),
        ([y, x + 1, z], 5.0),
        ([y, x, z - 1], 5.0),
        ([y, x, z + 1], 5.0),
    ];
    for (p, amp) in taps {
        for (im, b) in images.iter_mut().zip(code) {
            let v = im.get(p[0], p[1], p[2]);
            im.set(p[0], p[1], p[2], v + amp * b);
        }
    }
}

fn omp_config() -> OmpConfig {
    OmpConfig {
        fit_background: false,
        weight_coef_fit: false,
        colour_normalise: false,
        spot_shape: [3, 3, 3],
        shape_isolation_distance_yx: 3,
        shape_isolation_distance_z: Some(1),
        subset_pixels: 100,
        ..OmpConfig::default()
    }
}

#[test]
fn test_run_omp_finds_painted_genes() {
    let bled = test_bled_codes();
    let shape = [15, 15, 3];
    let mut tile0 = vec![Image3d::zeros(15, 15, 3); 9];
    paint_spot(&mut tile0, bled.code(0), [4, 4, 1]);
    paint_spot(&mut tile0, bled.code(2), [10, 10, 1]);
    let source = MemorySource {
        images: vec![tile0],
        n_rounds: 3,
        n_channels: 3,
    };
    let norm = vec![1.0; 9];
    let inputs = OmpInputs {
        tiles: &[0],
        tile_shape: shape,
        bled_codes: &bled,
        colour_norm_factor: &norm,
        pixel_size_xy: 0.26,
        pixel_size_z: 0.9,
    };
    let out = run_omp(&source, &inputs, &omp_config()).unwrap();
    assert_eq!(out.spot_tile, 0);
    assert_eq!(out.gene_no, vec![0, 2]);
    assert_eq!(out.local_yxz, vec![[4, 4, 1], [10, 10, 1]]);
    assert_eq!(out.tile, vec![0, 0]);
    assert_eq!(out.colours.n_spots, 2);
    assert!(out.scores.iter().all(|s| *s > 0.9));
    assert_eq!(out.spot.data.iter().filter(|v| **v == 1.0).count(), 7);
    assert!((out.mean_spot.get(1, 1, 1) - 10.0).abs() < 1e-3);
}

#[test]
fn test_run_omp_errors() {
    let bled = test_bled_codes();
    let norm = vec![1.0; 9];
    let blank = MemorySource {
        images: vec![vec![Image3d::zeros(15, 15, 3); 9]],
        n_rounds: 3,
        n_channels: 3,
    };
    let inputs = OmpInputs {
        tiles: &[0],
        tile_shape: [15, 15, 3],
        bled_codes: &bled,
        colour_norm_factor: &norm,
        pixel_size_xy: 0.26,
        pixel_size_z: 0.9,
    };
    assert!(matches!(
        run_omp(&blank, &inputs, &omp_config()),
        Err(OmpError::NoPositiveSpot(_))
    ));

    let mut tile0 = vec![Image3d::zeros(15, 15, 3); 9];
    paint_spot(&mut tile0, bled.code(1), [7, 7, 1]);
    let source = MemorySource {
        images: vec![tile0, vec![Image3d::zeros(15, 15, 3); 9]],
        n_rounds: 3,
        n_channels: 3,
    };
    let inputs = OmpInputs {
        tiles: &[0, 1],
        ..inputs
    };
    assert!(matches!(
        run_omp(&source, &inputs, &omp_config()),
        Err(OmpError::NoSpots(1))
    ));
    let no_tiles = OmpInputs {
        tiles: &[],
        ..inputs
    };
    assert!(matches!(
        run_omp(&source, &no_tiles, &omp_config()),
        Err(OmpError::NoTiles)
    ));
}
