use super::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("coppafish_config_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

const MINIMAL: &str = r#"{
  "file_names": {"notebook_dir": "nb", "tile_dir": "/data/tiles", "code_book": "codes.txt"},
  "basic_info": {"n_tiles": 2, "n_rounds": 3, "n_channels": 4, "anchor_channel": 1}
}"#;

#[test]
fn test_defaults_filled_in() {
    let dir = make_temp_dir();
    let path = dir.join("c.json");
    fs::write(&path, MINIMAL).unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.omp.max_genes, 10);
    assert_eq!(config.omp.spot_shape, [9, 9, 5]);
    assert!((config.omp.dp_thresh - 0.225).abs() < 1e-6);
    assert_eq!(config.filter.auto_thresh_multiplier, 10.0);
    assert_eq!(config.find_spots.radius_xy, 2);
    assert_eq!(config.call_spots.gene_efficiency_min_spots, 25);
    assert_eq!(config.thresholds, ThresholdsConfig::default());
    assert_eq!(config.basic_info.pixel_size_z, 0.9);
}

#[test]
fn test_relative_paths_resolved() {
    let dir = make_temp_dir();
    let path = dir.join("c.json");
    fs::write(&path, MINIMAL).unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.file_names.notebook_dir, dir.join("nb"));
    assert_eq!(config.file_names.tile_dir, PathBuf::from("/data/tiles"));
    assert_eq!(
        config.file_names.tile_path(1),
        PathBuf::from("/data/tiles/tile_1.bin")
    );
    assert_eq!(config.file_names.filtered_dir(), dir.join("nb").join("filtered"));
}

#[test]
fn test_partial_section_keeps_other_defaults() {
    let dir = make_temp_dir();
    let path = dir.join("c.json");
    let text = MINIMAL.trim_end().trim_end_matches('}').to_string()
        + r#", "omp": {"max_genes": 4}}"#;
    fs::write(&path, text).unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.omp.max_genes, 4);
    assert_eq!(config.omp.radius_xy, 3);
}

#[test]
fn test_validation_errors() {
    let dir = make_temp_dir();
    let path = dir.join("c.json");
    fs::write(&path, MINIMAL).unwrap();
    let base = Config::load(&path).unwrap();

    let mut c = base.clone();
    c.omp.spot_shape = [9, 8, 5];
    assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));

    let mut c = base.clone();
    c.basic_info.use_rounds = Some(vec![]);
    assert!(c.validate().is_err());

    let mut c = base.clone();
    c.basic_info.use_channels = Some(vec![0, 4]);
    assert!(c.validate().is_err());

    let mut c = base.clone();
    c.basic_info.dapi_channel = Some(0);
    c.basic_info.use_channels = Some(vec![0, 1]);
    assert!(c.validate().is_err());

    let mut c = base.clone();
    c.filter.r1 = Some(3);
    c.filter.r2 = Some(2);
    assert!(c.validate().is_err());

    assert!(base.validate().is_ok());
}

#[test]
fn test_parse_error_names_file() {
    let dir = make_temp_dir();
    let path = dir.join("bad.json");
    fs::write(&path, "{ not json").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("bad.json"));
}

#[test]
fn test_section_values_include_defaults() {
    let dir = make_temp_dir();
    let path = dir.join("c.json");
    fs::write(&path, MINIMAL).unwrap();
    let sections = Config::load(&path).unwrap().section_values();
    assert_eq!(sections["omp"]["max_genes"], 10);
    assert!(sections.contains_key("thresholds"));
}

#[test]
fn test_gene_efficiency_method_section() {
    let dir = make_temp_dir();
    let path = dir.join("c.json");
    fs::write(&path, MINIMAL).unwrap();
    let base = Config::load(&path).unwrap();
    assert_eq!(
        base.call_spots.gene_efficiency_method,
        GeneEfficiencyMethod::MedianScale
    );

    let text = MINIMAL.trim_end().trim_end_matches('}').to_string()
        + r#", "call_spots": {"gene_efficiency_method": "least_squares", "gene_efficiency_max": 4.0}}"#;
    fs::write(&path, text).unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(
        config.call_spots.gene_efficiency_method,
        GeneEfficiencyMethod::LeastSquares
    );
    assert_eq!(config.call_spots.gene_efficiency_max, Some(4.0));

    let mut c = base.clone();
    c.call_spots.gene_efficiency_max = Some(0.0);
    assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    let mut c = base.clone();
    c.call_spots.gene_efficiency_min_factor = -0.5;
    assert!(c.validate().is_err());
}
