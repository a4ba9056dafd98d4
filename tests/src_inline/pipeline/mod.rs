use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::StitchConfig;
use crate::model::{Affine, Image3d};
use crate::report::{OMP_SPOTS_FILE, REF_SPOTS_FILE, SUMMARY_FILE};
use crate::simulate::{SimulationOptions, simulate};

use super::stage3_filter::{
    FilterKernels, compute_auto_thresh, filter_dapi_image, filter_spot_image,
};
use super::stage5_stitch_register::{grid_origins, resolve_tile_origins};
use super::stage6_ref_spots::in_range_all_rounds;
use super::stage7_call_spots::{central_planes, codes_for_rounds, initial_bleed, nest};
use super::stage9_thresholds::{omp_spot_passes, ref_spot_passes};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("coppafish_pipeline_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn test_basic(n_tiles: usize, use_tiles: Vec<usize>) -> BasicInfo {
    BasicInfo {
        n_tiles,
        n_rounds: 2,
        n_channels: 3,
        use_tiles,
        use_rounds: vec![0, 1],
        use_channels: vec![0, 2],
        use_anchor: true,
        anchor_round: Some(2),
        anchor_channel: Some(0),
        dapi_channel: Some(1),
        tile_sz: 10,
        nz: 3,
        tile_centre: BasicInfo::centre_of(10, 3),
        pixel_size_xy: 0.26,
        pixel_size_z: 0.9,
        bad_trc: Vec::new(),
    }
}

#[test]
fn test_filter_images() {
    let mut image = Image3d::zeros(5, 5, 2);
    image.set(2, 2, 0, 4.4);
    image.set(1, 1, 1, -1.6);
    let none = FilterKernels {
        spot: None,
        dapi: None,
    };
    let spot = filter_spot_image(&image, &none).unwrap();
    assert_eq!(spot.get(2, 2, 0), 4.0);
    assert_eq!(spot.get(1, 1, 1), -2.0);

    let dapi = filter_dapi_image(&image, &none).unwrap();
    assert_eq!(dapi.get(1, 1, 1), 0.0);
    assert!((dapi.get(2, 2, 0) - 6.0).abs() < 1e-6);

    let mut plane = Image3d::zeros(2, 2, 1);
    plane.data = vec![-3.0, 1.0, 2.0, 5.0];
    assert_eq!(compute_auto_thresh(&plane, 10.0, 0), 25.0);
}

#[test]
fn test_filter_kernels_from_config() {
    let config = crate::config::FilterConfig {
        r1: Some(1),
        r2: None,
        r_dapi: Some(2),
        auto_thresh_multiplier: 10.0,
    };
    let kernels = FilterKernels::from_config(&config).unwrap();
    let spot = kernels.spot.unwrap();
    assert_eq!((spot.ny, spot.nx), (5, 5));
    assert_eq!(kernels.dapi.unwrap().ny, 5);
}

#[test]
fn test_tile_origin_sources() {
    let basic = test_basic(3, vec![0, 2]);
    let stitch = StitchConfig {
        tile_pos_yx: Some(vec![[0, 0], [0, 1], [1, 0]]),
        expected_overlap: 0.1,
        ..StitchConfig::default()
    };
    let (origins, source) = resolve_tile_origins(&basic, &stitch, None).unwrap();
    assert_eq!(source, "grid");
    assert_eq!(origins[0], Some([0.0, 0.0, 0.0]));
    assert_eq!(origins[1], None);
    assert_eq!(origins[2], Some([9.0, 0.0, 0.0]));

    let explicit = StitchConfig {
        tile_origins: Some(vec![Some([1.0, 2.0, 0.0]), None, Some([3.0, 4.0, 0.0])]),
        ..stitch.clone()
    };
    let (origins, source) = resolve_tile_origins(&basic, &explicit, None).unwrap();
    assert_eq!(source, "config");
    assert_eq!(origins[2], Some([3.0, 4.0, 0.0]));

    let missing_used = StitchConfig {
        tile_origins: Some(vec![Some([1.0, 2.0, 0.0]), None, None]),
        ..stitch
    };
    assert!(matches!(
        resolve_tile_origins(&basic, &missing_used, None),
        Err(PipelineError::Invalid(_))
    ));
    assert!(resolve_tile_origins(&basic, &StitchConfig::default(), None).is_err());

    let single = test_basic(1, vec![0]);
    let (origins, source) = resolve_tile_origins(&single, &StitchConfig::default(), None).unwrap();
    assert_eq!((origins, source), (vec![Some([0.0; 3])], "single"));
}

#[test]
fn test_grid_origins_overlap() {
    let origins = grid_origins(&[[2, 3]], 100, 0.25);
    assert_eq!(origins, vec![[150.0, 225.0, 0.0]]);
}

#[test]
fn test_in_range_all_rounds() {
    let basic = test_basic(1, vec![0]);
    let mut transforms = Transforms::identity(1, 3, 3);
    transforms.set(0, 1, 2, Affine::from_shift([0.0, 3.0, 0.0]));
    let keep = in_range_all_rounds(&basic, &transforms, 0, &[[5, 5, 1], [5, 8, 1], [9, 0, 2]]);
    assert_eq!(keep, vec![true, false, true]);
}

#[test]
fn test_call_spots_helpers() {
    let codes = GeneCodesFixture::codes();
    let picked = codes_for_rounds(&codes, &[0, 2]).unwrap();
    assert_eq!(picked.codes, vec![vec![0, 2], vec![1, 0]]);
    assert!(codes_for_rounds(&codes, &[3]).is_err());

    let basic = test_basic(1, vec![0]);
    assert_eq!(
        initial_bleed(&basic, None).unwrap(),
        vec![vec![1.0, 0.0], vec![0.0, 1.0]]
    );
    let dir = make_temp_dir();
    let path = dir.join("bleed.json");
    fs::write(&path, "[[1.0, 0.5, 0.1], [0.2, 0.3, 0.9]]").unwrap();
    assert_eq!(
        initial_bleed(&basic, Some(&path)).unwrap(),
        vec![vec![1.0, 0.1], vec![0.2, 0.9]]
    );

    assert_eq!(central_planes(5, 1), vec![2]);
    assert_eq!(central_planes(6, 2), vec![2, 3]);
    assert_eq!(central_planes(3, 10), vec![0, 1, 2]);
    assert_eq!(nest(&[1.0, 2.0, 3.0, 4.0], 2), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
}

struct GeneCodesFixture;

impl GeneCodesFixture {
    fn codes() -> crate::model::GeneCodes {
        crate::model::GeneCodes {
            names: vec!["a".to_string(), "b".to_string()],
            codes: vec![vec![0, 1, 2], vec![1, 2, 0]],
        }
    }
}

#[test]
fn test_threshold_rules() {
    let t = crate::config::ThresholdsConfig::default();
    assert!(ref_spot_passes(&t, 0.3, 0.2));
    assert!(!ref_spot_passes(&t, 0.3, 0.1));
    assert!(!ref_spot_passes(&t, 0.25, 0.2));
    assert!(omp_spot_passes(&t, 0.2));
    assert!(!omp_spot_passes(&t, 0.15));
}

#[test]
fn test_pipeline_on_simulated_experiment() {
    let dir = make_temp_dir();
    let options = SimulationOptions {
        seed: 7,
        ..SimulationOptions::default()
    };
    let truth = simulate(&dir, &options).unwrap();
    let nb = run_pipeline(&truth.config_path).unwrap();
    for page in [
        "basic_info",
        "extract",
        "filter",
        "filter_debug",
        "find_spots",
        "stitch",
        "register",
        "register_debug",
        "ref_spots",
        "call_spots",
        "omp",
        "thresholds",
    ] {
        assert!(nb.has_page(page).unwrap(), "missing page {}", page);
    }
    assert_eq!(nb.get::<String>("stitch", "source").unwrap(), "grid");
    assert_eq!(nb.get::<usize>("register_debug", "n_non_identity").unwrap(), 0);

    let ref_yxz: Vec<[i32; 3]> = nb.get("ref_spots", "local_yxz").unwrap();
    let ref_tile: Vec<usize> = nb.get("ref_spots", "tile").unwrap();
    let ref_gene: Vec<usize> = nb.get("call_spots", "gene_no").unwrap();
    assert_eq!(ref_yxz.len(), truth.spots.len());
    let correct = truth
        .spots
        .iter()
        .filter(|s| {
            (0..ref_yxz.len()).any(|i| {
                ref_tile[i] == s.tile && ref_yxz[i] == s.local_yxz && ref_gene[i] == s.gene
            })
        })
        .count();
    assert!(
        correct * 10 >= truth.spots.len() * 8,
        "{} of {} reference spots called correctly",
        correct,
        truth.spots.len()
    );

    let omp_yxz: Vec<[i32; 3]> = nb.get("omp", "local_yxz").unwrap();
    let omp_tile: Vec<usize> = nb.get("omp", "tile").unwrap();
    let omp_gene: Vec<usize> = nb.get("omp", "gene_no").unwrap();
    let found = truth
        .spots
        .iter()
        .filter(|s| {
            (0..omp_yxz.len()).any(|i| {
                let p = omp_yxz[i];
                omp_tile[i] == s.tile
                    && omp_gene[i] == s.gene
                    && (p[0] - s.local_yxz[0]).abs() <= 1
                    && (p[1] - s.local_yxz[1]).abs() <= 1
                    && (p[2] - s.local_yxz[2]).abs() <= 1
            })
        })
        .count();
    assert!(
        found * 4 >= truth.spots.len() * 3,
        "{} of {} spots found by OMP",
        found,
        truth.spots.len()
    );

    let out_dir = dir.join("notebook").join("output");
    let ref_table = fs::read_to_string(out_dir.join(REF_SPOTS_FILE)).unwrap();
    assert!(ref_table.starts_with("tile\ty\tx\tz\tgene\tscore\n"));
    assert!(ref_table.lines().count() > 1);
    assert!(out_dir.join(OMP_SPOTS_FILE).is_file());
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join(SUMMARY_FILE)).unwrap()).unwrap();
    assert_eq!(summary["n_genes"], 4);

    // A second run finds every page and only rewrites the reports.
    let created = nb.page("omp").unwrap().time_created();
    let again = run_pipeline(&truth.config_path).unwrap();
    assert_eq!(again.page("omp").unwrap().time_created(), created);
}

#[test]
fn test_pipeline_partial_stage_and_rerun() {
    let dir = make_temp_dir();
    let truth = simulate(
        &dir,
        &SimulationOptions {
            seed: 7,
            ..SimulationOptions::default()
        },
    )
    .unwrap();
    let nb = run_pipeline(&truth.config_path).unwrap();
    let nb_dir = nb.dir().to_path_buf();
    let register_created = nb.page("register").unwrap().time_created();
    let omp_created = nb.page("omp").unwrap().time_created();

    let mut nb = Notebook::open(&nb_dir, Some(&truth.config_path)).unwrap();
    nb.delete_page("register_debug").unwrap();
    assert!(matches!(
        run_pipeline(&truth.config_path),
        Err(PipelineError::Invalid(_))
    ));
    assert!(!nb_dir.join("register_debug").exists());

    nb.delete_page("register").unwrap();
    let again = run_pipeline(&truth.config_path).unwrap();
    assert!(again.has_page("register").unwrap());
    assert!(again.has_page("register_debug").unwrap());
    assert!(again.page("register").unwrap().time_created() >= register_created);
    assert_eq!(again.page("omp").unwrap().time_created(), omp_created);
}

#[test]
fn test_pipeline_rejects_wrong_round_count() {
    let dir = make_temp_dir();
    let truth = simulate(
        &dir,
        &SimulationOptions {
            n_tiles: 1,
            spots_per_tile: 4,
            tile_sz: 24,
            ..SimulationOptions::default()
        },
    )
    .unwrap();
    let mut config = Config::load(&truth.config_path).unwrap();
    config.basic_info.anchor_channel = None;
    let path = dir.join("no_anchor.json");
    config.file_names.notebook_dir = dir.join("nb_no_anchor");
    config.save(&path).unwrap();
    assert!(matches!(
        run_pipeline(&path),
        Err(PipelineError::Invalid(_))
    ));
}
