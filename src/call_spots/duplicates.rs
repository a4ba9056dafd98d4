use super::CallSpotsError;

/// Whether each spot lies on the tile whose centre is nearest in yx.
///
/// `tile_origin` is indexed by tile; unused tiles may hold NaN, but a spot on
/// a tile with a NaN origin is an error.
pub fn get_non_duplicate(
    tile_origin: &[[f32; 3]],
    use_tiles: &[usize],
    tile_centre: [f32; 3],
    local_yxz: &[[i32; 3]],
    spot_tile: &[usize],
) -> Result<Vec<bool>, CallSpotsError> {
    let mut nan_tiles: Vec<usize> = spot_tile
        .iter()
        .copied()
        .filter(|&t| tile_origin.get(t).is_none_or(|o| o.iter().any(|v| v.is_nan())))
        .collect();
    nan_tiles.sort_unstable();
    nan_tiles.dedup();
    if !nan_tiles.is_empty() {
        return Err(CallSpotsError::NanTileOrigin(nan_tiles));
    }

    let centres: Vec<(usize, [f32; 2])> = use_tiles
        .iter()
        .filter_map(|&t| tile_origin.get(t).map(|o| (t, o)))
        .filter(|(_, o)| !o[0].is_nan() && !o[1].is_nan())
        .map(|(t, o)| (t, [o[0] + tile_centre[0], o[1] + tile_centre[1]]))
        .collect();

    Ok(local_yxz
        .iter()
        .zip(spot_tile)
        .map(|(p, &t)| {
            let origin = tile_origin[t];
            let gy = p[0] as f32 + origin[0];
            let gx = p[1] as f32 + origin[1];
            let mut nearest = None;
            let mut best = f32::INFINITY;
            for &(ct, c) in &centres {
                let d = (gy - c[0]).powi(2) + (gx - c[1]).powi(2);
                if d < best {
                    best = d;
                    nearest = Some(ct);
                }
            }
            nearest == Some(t)
        })
        .collect())
}
