use crate::model::Image3d;

/// Mean of `image` over windows of `spot_shape` centred on each of `yxz`.
/// Voxels outside the image count as zero; no spots gives zeros.
pub fn compute_mean_spot_from(image: &Image3d, yxz: &[[i32; 3]], spot_shape: [usize; 3]) -> Image3d {
    let mut mean = Image3d::zeros(spot_shape[0], spot_shape[1], spot_shape[2]);
    if yxz.is_empty() {
        return mean;
    }
    let half = spot_shape.map(|s| (s / 2) as i64);
    for p in yxz {
        for i in 0..spot_shape[0] {
            for j in 0..spot_shape[1] {
                for k in 0..spot_shape[2] {
                    let y = p[0] as i64 + i as i64 - half[0];
                    let x = p[1] as i64 + j as i64 - half[1];
                    let z = p[2] as i64 + k as i64 - half[2];
                    if let Some(v) = image.get_checked(y, x, z) {
                        let idx = mean.index(i, j, k);
                        mean.data[idx] += v;
                    }
                }
            }
        }
    }
    let n = yxz.len() as f32;
    for v in mean.data.iter_mut() {
        *v /= n;
    }
    mean
}

/// Ones where the mean spot is at least `sign_thresh`.
pub fn spot_from_mean(mean_spot: &Image3d, sign_thresh: f32) -> Image3d {
    let mut spot = mean_spot.clone();
    for v in spot.data.iter_mut() {
        *v = if *v >= sign_thresh { 1.0 } else { 0.0 };
    }
    spot
}

/// Number of ones on the y and x faces of a spot, over all z.
pub fn count_edge_ones(spot: &Image3d) -> usize {
    let mut count = 0;
    for y in 0..spot.ny {
        for x in 0..spot.nx {
            let edge = y == 0 || x == 0 || y + 1 == spot.ny || x + 1 == spot.nx;
            if !edge {
                continue;
            }
            for z in 0..spot.nz {
                if spot.get(y, x, z) == 1.0 {
                    count += 1;
                }
            }
        }
    }
    count
}
