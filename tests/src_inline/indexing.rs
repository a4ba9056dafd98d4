use super::*;

fn basic() -> BasicInfo {
    BasicInfo {
        n_tiles: 3,
        n_rounds: 3,
        n_channels: 5,
        use_tiles: vec![2, 0],
        use_rounds: vec![0, 1, 2],
        use_channels: vec![1, 2],
        use_anchor: true,
        anchor_round: Some(3),
        anchor_channel: Some(4),
        dapi_channel: Some(0),
        tile_sz: 8,
        nz: 4,
        tile_centre: BasicInfo::centre_of(8, 4),
        pixel_size_xy: 0.26,
        pixel_size_z: 0.9,
        bad_trc: vec![[0, 1, 2]],
    }
}

#[test]
fn test_default_is_sequencing_images() {
    let idx = create(&basic(), IndexOptions::default());
    assert_eq!(idx.len(), 2 * 3 * 2);
    assert_eq!(idx[0], [0, 0, 1]);
    assert_eq!(*idx.last().unwrap(), [2, 2, 2]);
    assert!(idx.contains(&[0, 1, 2]));
}

#[test]
fn test_excludes_bad_trc() {
    let opts = IndexOptions {
        include_bad_trc: false,
        ..IndexOptions::default()
    };
    let idx = create(&basic(), opts);
    assert_eq!(idx.len(), 11);
    assert!(!idx.contains(&[0, 1, 2]));
}

#[test]
fn test_anchor_and_dapi() {
    let idx = create(&basic(), IndexOptions::anchor_only());
    assert_eq!(idx, vec![[0, 3, 4], [2, 3, 4]]);

    let opts = IndexOptions {
        include_anchor_round: true,
        include_dapi_anchor: true,
        ..IndexOptions::default()
    };
    let idx = create(&basic(), opts);
    assert!(idx.contains(&[2, 3, 0]));
    assert!(!idx.contains(&[2, 3, 4]));
    assert!(!idx.contains(&[2, 0, 0]));
}

#[test]
fn test_missing_anchor_adds_nothing() {
    let mut b = basic();
    b.use_anchor = false;
    b.anchor_round = None;
    b.anchor_channel = None;
    assert!(create(&b, IndexOptions::anchor_only()).is_empty());
}

#[test]
fn test_projections_and_channels() {
    let idx = create(&basic(), IndexOptions::default());
    assert_eq!(project_tile(&idx), vec![0, 2]);
    assert_eq!(project_tile_round(&idx).len(), 6);
    assert_eq!(find_channels_for(&idx, 2, 1), vec![1, 2]);
    assert!(find_channels_for(&idx, 1, 1).is_empty());
}

#[test]
fn test_images_for_tile() {
    let opts = IndexOptions {
        include_anchor_round: true,
        include_anchor_channel: true,
        include_bad_trc: false,
        ..IndexOptions::default()
    };
    let idx = create(&basic(), opts);
    assert_eq!(
        images_for_tile(&idx, 0),
        vec![[0, 1], [0, 2], [1, 1], [2, 1], [2, 2], [3, 4]]
    );
    assert_eq!(images_for_tile(&idx, 2).len(), 7);
    assert!(images_for_tile(&idx, 1).is_empty());
}
