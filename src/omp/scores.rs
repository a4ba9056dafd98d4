use rayon::prelude::*;

use crate::model::Image3d;

/// Scores every voxel of a coefficient image against the expected spot.
///
/// Positive coefficients map to `c / (c + high_coef_bias)`, others to zero.
/// The score is the mean-spot-weighted average of the mapped values over the
/// voxels where `spot` is one, centred on the scored voxel. Outside the
/// image counts as zero.
pub fn score_coefficient_image(
    coefs: &Image3d,
    spot: &Image3d,
    mean_spot: &Image3d,
    high_coef_bias: f32,
) -> Image3d {
    let half = [
        (spot.ny / 2) as i64,
        (spot.nx / 2) as i64,
        (spot.nz / 2) as i64,
    ];
    let mut taps = Vec::new();
    for i in 0..spot.ny {
        for j in 0..spot.nx {
            for k in 0..spot.nz {
                if spot.get(i, j, k) == 1.0 {
                    taps.push((
                        i as i64 - half[0],
                        j as i64 - half[1],
                        k as i64 - half[2],
                        mean_spot.get(i, j, k),
                    ));
                }
            }
        }
    }
    let total: f32 = taps.iter().map(|t| t.3).sum();
    let mapped: Vec<f32> = coefs
        .data
        .iter()
        .map(|&c| if c > 0.0 { c / (c + high_coef_bias) } else { 0.0 })
        .collect();
    let mapped = Image3d {
        ny: coefs.ny,
        nx: coefs.nx,
        nz: coefs.nz,
        data: mapped,
    };

    let data: Vec<f32> = (0..coefs.data.len())
        .into_par_iter()
        .map(|idx| {
            if total == 0.0 {
                return 0.0;
            }
            let [y, x, z] = coefs.position(idx);
            let mut acc = 0f32;
            for &(dy, dx, dz, w) in &taps {
                if let Some(v) = mapped.get_checked(y as i64 + dy, x as i64 + dx, z as i64 + dz) {
                    acc += w * v;
                }
            }
            acc / total
        })
        .collect();
    Image3d {
        ny: coefs.ny,
        nx: coefs.nx,
        nz: coefs.nz,
        data,
    }
}
