use super::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("coppafish_tile_bin_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn ramp(offset: f32) -> Image3d {
    let mut im = Image3d::zeros(3, 4, 2);
    for (i, v) in im.data.iter_mut().enumerate() {
        *v = offset + i as f32;
    }
    im
}

#[test]
fn test_write_then_read_voxels() {
    let dir = make_temp_dir();
    let path = dir.join("t0.bin");
    let images = vec![
        vec![ramp(0.0), ramp(100.0)],
        vec![ramp(200.0), ramp(300.0)],
        vec![ramp(400.0), ramp(500.0)],
    ];
    write_tile_stack(&path, &images).unwrap();

    let stack = TileStack::open(&path).unwrap();
    assert_eq!((stack.n_rounds, stack.n_channels), (3, 2));
    assert_eq!(stack.shape(), [3, 4, 2]);
    assert_eq!(stack.image(2, 1).unwrap().get(0, 0, 0), 500.0);
    assert_eq!(stack.image(1, 0).unwrap().get(2, 3, 1), 200.0 + 23.0);
    assert_eq!(stack.image(1, 1).unwrap(), ramp(300.0));

    assert!(stack.image(3, 0).is_err());
    assert!(stack.image(0, 2).is_err());
}

#[test]
fn test_rejects_bad_files() {
    let dir = make_temp_dir();
    let path = dir.join("bad.bin");
    fs::write(&path, b"CFTILE").unwrap();
    assert!(TileStack::open(&path).is_err());

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"NOTATILE");
    bytes.extend_from_slice(&[0u8; 24]);
    fs::write(&path, &bytes).unwrap();
    assert!(TileStack::open(&path).is_err());

    write_tile_stack(&path, &[vec![ramp(0.0)]]).unwrap();
    let mut bytes = fs::read(&path).unwrap();
    bytes.pop();
    fs::write(&path, &bytes).unwrap();
    let err = TileStack::open(&path).unwrap_err();
    assert!(err.to_string().contains("does not match"));

    assert!(matches!(
        TileStack::open(&dir.join("missing.bin")),
        Err(InputError::MissingInput(_))
    ));
}

#[test]
fn test_writer_rejects_mixed_shapes() {
    let dir = make_temp_dir();
    let path = dir.join("mixed.bin");
    let images = vec![vec![ramp(0.0), Image3d::zeros(2, 2, 2)]];
    assert!(write_tile_stack(&path, &images).is_err());
    assert!(write_tile_stack(&path, &[]).is_err());
}
