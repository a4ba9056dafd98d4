use super::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::input::tile_bin::write_tile_stack;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!(
        "coppafish_spot_colours_test_{}_{}",
        std::process::id(),
        id
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_apply_transform_shift_and_range() {
    let yxz = [[0, 0, 0], [5, 5, 1], [9, 9, 3]];
    let affine = Affine::from_shift([1.0, -1.0, 0.0]);
    let (out, in_range) = apply_transform(&yxz, None, &affine, [10, 10, 4]);
    assert_eq!(out, vec![[1, -1, 0], [6, 4, 1], [10, 8, 3]]);
    assert_eq!(in_range, vec![false, true, false]);
}

#[test]
fn test_apply_transform_subtracts_flow_and_rounds_even() {
    let mut fy = Image3d::zeros(4, 4, 1);
    fy.set(2, 2, 0, 0.5);
    let flow = [fy, Image3d::zeros(4, 4, 1), Image3d::zeros(4, 4, 1)];
    let (out, in_range) = apply_transform(&[[2, 2, 0]], Some(&flow), &Affine::identity(), [4, 4, 1]);
    // 2 - 0.5 = 1.5 rounds to 2
    assert_eq!(out, vec![[2, 2, 0]]);
    assert!(in_range[0]);
}

#[test]
fn test_sample_trilinear() {
    let mut im = Image3d::zeros(2, 2, 2);
    im.set(0, 0, 0, 8.0);
    im.set(1, 1, 1, 4.0);
    assert_eq!(sample_trilinear(&im, [0.0, 0.0, 0.0]), 8.0);
    assert_eq!(sample_trilinear(&im, [0.5, 0.5, 0.5]), 1.5);
    // half outside the volume mixes with zero
    assert_eq!(sample_trilinear(&im, [-0.5, 0.0, 0.0]), 4.0);
    assert_eq!(sample_trilinear(&im, [5.0, 0.0, 0.0]), 0.0);
}

#[test]
fn test_get_spot_colours_uses_transforms() {
    let dir = make_temp_dir();
    let path = dir.join("tile.bin");
    let mut images = Vec::new();
    for r in 0..2 {
        let mut round = Vec::new();
        for c in 0..3 {
            let mut im = Image3d::zeros(4, 4, 2);
            for (i, v) in im.data.iter_mut().enumerate() {
                *v = (100 * r + 10 * c) as f32 + i as f32;
            }
            round.push(im);
        }
        images.push(round);
    }
    write_tile_stack(&path, &images).unwrap();
    let stack = TileStack::open(&path).unwrap();

    let mut tf = Transforms::identity(1, 2, 3);
    tf.set(0, 1, 1, Affine::from_shift([1.0, 0.0, 0.0]));
    tf.set(0, 1, 2, Affine::from_shift([1.0, 0.0, 0.0]));
    let yxz = [[0, 0, 0], [3, 0, 0]];
    let colours = get_spot_colours(&stack, 0, 1, &[1, 2], Some(2), &yxz, &tf).unwrap();
    // channel 1 shifted by one row (8 voxels); channel 2 is DAPI and read in place
    assert_eq!(colours, vec![118.0, 120.0, 0.0, 144.0]);
}

#[test]
fn test_all_pixel_yxz_order() {
    let yxz = all_pixel_yxz(2, 3, &[4, 7]);
    assert_eq!(yxz.len(), 12);
    assert_eq!(yxz[0], [0, 0, 4]);
    assert_eq!(yxz[1], [0, 1, 4]);
    assert_eq!(yxz[3], [1, 0, 4]);
    assert_eq!(yxz[6], [0, 0, 7]);
}

#[test]
fn test_remove_background() {
    let mut colours = SpotColours::new(4, 2);
    colours.push(&[1.0, 10.0, 2.0, 10.0, 3.0, 10.0, 4.0, 50.0]);
    let bg = remove_background(&mut colours);
    assert_eq!(bg, vec![1.75, 10.0]);
    assert_eq!(colours.get(0, 0, 0), -0.75);
    assert_eq!(colours.get(0, 3, 1), 40.0);
}

#[test]
fn test_normalise_rc_recovers_round_scale() {
    // round 1 is twice as bright as round 0 and 2 in every channel
    let mut pixels = SpotColours::new(3, 2);
    for p in 0..40 {
        let v = 1.0 + p as f32;
        pixels.push(&[v, v, 2.0 * v, 2.0 * v, v, v]);
    }
    let mut spots = SpotColours::new(3, 2);
    spots.push(&[10.0, 1.0, 20.0, 1.0, 10.0, 1.0]);
    spots.push(&[1.0, 5.0, 1.0, 10.0, 1.0, 5.0]);
    let factors = normalise_rc(&pixels, &spots, 75.0, 10);
    assert_eq!(factors.len(), 6);
    assert!((factors[0] - 10.0).abs() < 1e-4);
    assert!((factors[1] - 5.0).abs() < 1e-4);
    assert!((factors[2] - 40.0).abs() < 1e-3);
    assert!((factors[3] - 20.0).abs() < 1e-3);
}
