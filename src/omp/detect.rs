use crate::model::Image3d;
use crate::morphology::{MorphologyError, ball, dilate};

/// Local maxima of `image` above `threshold` within an ellipsoid of radius
/// `radius_xy` in y/x and `radius_z` in z.
///
/// A plateau of equal maxima keeps only its voxel with the smallest index.
/// Positions and values come back in raster order.
pub fn detect_spots(
    image: &Image3d,
    threshold: f32,
    radius_xy: usize,
    radius_z: usize,
) -> Result<(Vec<[i32; 3]>, Vec<f32>), MorphologyError> {
    let footprint = ball(radius_xy, radius_z);
    let dilated = dilate(image, &footprint)?;
    let (ry, rz) = (radius_xy as i64, radius_z as i64);
    let mut offsets = Vec::new();
    for i in 0..footprint.ny {
        for j in 0..footprint.nx {
            for k in 0..footprint.nz {
                let o = (i as i64 - ry, j as i64 - ry, k as i64 - rz);
                if footprint.get(i, j, k) != 0.0 && o != (0, 0, 0) {
                    offsets.push(o);
                }
            }
        }
    }

    let mut yxz = Vec::new();
    let mut values = Vec::new();
    for y in 0..image.ny {
        for x in 0..image.nx {
            for z in 0..image.nz {
                let idx = image.index(y, x, z);
                let v = image.data[idx];
                if !(v > threshold) || v != dilated.data[idx] {
                    continue;
                }
                let tied = offsets.iter().any(|&(dy, dx, dz)| {
                    let (ny, nx, nz) = (y as i64 + dy, x as i64 + dx, z as i64 + dz);
                    match image.get_checked(ny, nx, nz) {
                        Some(n) if n == v => image.index(ny as usize, nx as usize, nz as usize) < idx,
                        _ => false,
                    }
                });
                if tied {
                    continue;
                }
                yxz.push([y as i32, x as i32, z as i32]);
                values.push(v);
            }
        }
    }
    Ok((yxz, values))
}

/// Whether each spot has no other spot within the ellipsoid of radius
/// `radius_xy` in y/x and `radius_z` in z.
pub fn isolated_spots(yxz: &[[i32; 3]], radius_xy: f32, radius_z: f32) -> Vec<bool> {
    let inside = |a: &[i32; 3], b: &[i32; 3]| {
        let dy = (a[0] - b[0]) as f32;
        let dx = (a[1] - b[1]) as f32;
        let dz = (a[2] - b[2]) as f32;
        let mut d = 0f32;
        if radius_xy > 0.0 {
            d += (dy * dy + dx * dx) / (radius_xy * radius_xy);
        } else if dy != 0.0 || dx != 0.0 {
            return false;
        }
        if radius_z > 0.0 {
            d += dz * dz / (radius_z * radius_z);
        } else if dz != 0.0 {
            return false;
        }
        d <= 1.0
    };
    yxz.iter()
        .enumerate()
        .map(|(i, a)| {
            !yxz.iter()
                .enumerate()
                .any(|(j, b)| i != j && inside(a, b))
        })
        .collect()
}

/// Keeps at most `max_per_z` of the brightest spots on each z plane,
/// preserving the input order of the survivors.
pub fn limit_spots_per_z(
    yxz: &[[i32; 3]],
    values: &[f32],
    max_per_z: usize,
) -> (Vec<[i32; 3]>, Vec<f32>) {
    let mut keep = vec![true; yxz.len()];
    let mut planes: Vec<i32> = yxz.iter().map(|p| p[2]).collect();
    planes.sort_unstable();
    planes.dedup();
    for z in planes {
        let mut on_plane: Vec<usize> = (0..yxz.len()).filter(|&i| yxz[i][2] == z).collect();
        if on_plane.len() <= max_per_z {
            continue;
        }
        on_plane.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
        for &i in &on_plane[max_per_z..] {
            keep[i] = false;
        }
    }
    let mut out_yxz = Vec::new();
    let mut out_values = Vec::new();
    for (i, k) in keep.into_iter().enumerate() {
        if k {
            out_yxz.push(yxz[i]);
            out_values.push(values[i]);
        }
    }
    (out_yxz, out_values)
}
