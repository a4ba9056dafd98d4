use super::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("coppafish_notebook_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_config(dir: &Path, multiplier: f32) -> PathBuf {
    let path = dir.join("config.json");
    let text = format!(
        r#"{{
  "file_names": {{"notebook_dir": "nb", "tile_dir": "tiles", "code_book": "codebook.txt"}},
  "basic_info": {{"n_tiles": 1, "n_rounds": 2, "n_channels": 2}},
  "filter": {{"auto_thresh_multiplier": {}}}
}}"#,
        multiplier
    );
    fs::write(&path, text).unwrap();
    path
}

fn debug_page(a: i32, b: &str) -> NotebookPage {
    let mut page = NotebookPage::new("debug").unwrap();
    page.set("a", &a).unwrap();
    page.set("b", b).unwrap();
    page
}

#[test]
fn test_create_requires_config() {
    let dir = make_temp_dir().join("nb");
    assert!(matches!(
        Notebook::open(&dir, None),
        Err(NotebookError::ConfigRequired(_))
    ));
    assert!(matches!(
        Notebook::open(&dir, Some(Path::new("/nonexistent/config.json"))),
        Err(NotebookError::ConfigMissing(_))
    ));
    assert!(!dir.exists());
}

#[test]
fn test_page_round_trip_through_disk() {
    let root = make_temp_dir();
    let config = write_config(&root, 10.0);
    let dir = root.join("nb");
    let mut nb = Notebook::open(&dir, Some(&config)).unwrap();
    nb.add_page(debug_page(7, "seven")).unwrap();
    let created = nb.time_created();

    let loaded = Notebook::open(&dir, None).unwrap();
    assert_eq!(loaded.time_created(), created);
    assert!(loaded.has_page("debug").unwrap());
    assert_eq!(loaded.get::<i32>("debug", "a").unwrap(), 7);
    assert_eq!(loaded.get::<String>("debug", "b").unwrap(), "seven");
    assert!(dir.join("debug").join("a.json.gz").is_file());
    assert_eq!(loaded.all_versions()["debug"], software_version());
}

#[test]
fn test_floats_round_trip_exactly() {
    let root = make_temp_dir();
    let config = write_config(&root, 10.0);
    let dir = root.join("nb");
    let mut nb = Notebook::open(&dir, Some(&config)).unwrap();
    let wide = 1792132276.7361727_f64;
    let narrow = [0.1_f32, 1.0e-7, 3.4028235e38, -2.7182817];
    let mut page = NotebookPage::new("debug").unwrap();
    page.set("a", &wide).unwrap();
    page.set("b", &narrow).unwrap();
    nb.add_page(page).unwrap();
    let page_created = nb.page("debug").unwrap().time_created();

    let loaded = Notebook::open(&dir, None).unwrap();
    assert_eq!(loaded.get::<f64>("debug", "a").unwrap(), wide);
    assert_eq!(loaded.get::<[f32; 4]>("debug", "b").unwrap(), narrow);
    assert_eq!(loaded.page("debug").unwrap().time_created(), page_created);
    assert_eq!(loaded.time_created(), nb.time_created());
}

#[test]
fn test_pages_are_write_once() {
    let root = make_temp_dir();
    let config = write_config(&root, 10.0);
    let mut nb = Notebook::open(&root.join("nb"), Some(&config)).unwrap();
    nb.add_page(debug_page(1, "x")).unwrap();
    assert!(matches!(
        nb.add_page(debug_page(2, "y")),
        Err(NotebookError::PageExists(_))
    ));
    nb.delete_page("debug").unwrap();
    assert!(!nb.has_page("debug").unwrap());
    assert!(!root.join("nb").join("debug").exists());
    nb.add_page(debug_page(2, "y")).unwrap();
    assert_eq!(nb.get::<i32>("debug", "a").unwrap(), 2);
}

#[test]
fn test_variable_rules() {
    let mut page = NotebookPage::new("debug").unwrap();
    assert!(matches!(
        page.set("c", &1),
        Err(NotebookError::UnknownVariable { .. })
    ));
    page.set("a", &1).unwrap();
    assert!(matches!(page.set("a", &2), Err(NotebookError::AlreadySet { .. })));
    assert!(matches!(page.get::<i32>("b"), Err(NotebookError::Unset { .. })));
    assert_eq!(page.unset_variables(), vec!["b"]);
    assert!(page.get::<String>("a").is_err());
    assert!(matches!(
        NotebookPage::new("nope"),
        Err(NotebookError::UnknownPage(_))
    ));
}

#[test]
fn test_add_page_rejects_unset_variables() {
    let root = make_temp_dir();
    let config = write_config(&root, 10.0);
    let mut nb = Notebook::open(&root.join("nb"), Some(&config)).unwrap();
    let mut page = NotebookPage::new("debug").unwrap();
    page.set("a", &1).unwrap();
    assert!(matches!(
        nb.add_page(page),
        Err(NotebookError::UnsetVariables { .. })
    ));
    assert!(!nb.has_page("debug").unwrap());
}

#[test]
fn test_has_page_unknown_name() {
    let root = make_temp_dir();
    let config = write_config(&root, 10.0);
    let nb = Notebook::open(&root.join("nb"), Some(&config)).unwrap();
    assert!(matches!(nb.has_page("bogus"), Err(NotebookError::UnknownPage(_))));
    assert!(matches!(nb.page("omp"), Err(NotebookError::PageMissing(_))));
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Thresholds {
    score_ref: f32,
    score_omp: f32,
    intensity: f32,
    n_ref_pass: usize,
    n_omp_pass: usize,
}

#[test]
fn test_config_sections_recorded() {
    let root = make_temp_dir();
    let config = write_config(&root, 10.0);
    let dir = root.join("nb");
    let mut nb = Notebook::open(&dir, Some(&config)).unwrap();
    let values = Thresholds {
        score_ref: 0.25,
        score_omp: 0.15,
        intensity: 0.15,
        n_ref_pass: 3,
        n_omp_pass: 4,
    };
    let mut page = NotebookPage::new("thresholds").unwrap();
    page.set_all(&values).unwrap();
    nb.add_page(page).unwrap();

    let loaded = Notebook::open(&dir, Some(&config)).unwrap();
    let page = loaded.page("thresholds").unwrap();
    assert_eq!(page.get_all::<Thresholds>().unwrap(), values);
    assert!(page.config_sections().contains_key("thresholds"));
    assert!(!page.config_sections().contains_key("omp"));
}

#[test]
fn test_non_debug_page_needs_config() {
    let root = make_temp_dir();
    let config = write_config(&root, 10.0);
    let dir = root.join("nb");
    Notebook::open(&dir, Some(&config)).unwrap();
    let mut nb = Notebook::open(&dir, None).unwrap();
    let mut page = NotebookPage::new("stitch").unwrap();
    page.set("tile_origin", &vec![[0f32, 0.0, 0.0]]).unwrap();
    page.set("source", "config").unwrap();
    assert!(matches!(
        nb.add_page(page),
        Err(NotebookError::ConfigRequired(_))
    ));
    nb.add_page(debug_page(1, "ok")).unwrap();
}

#[test]
fn test_resave_rejects_unexpected_entries() {
    let root = make_temp_dir();
    let config = write_config(&root, 10.0);
    let dir = root.join("nb");
    let mut nb = Notebook::open(&dir, Some(&config)).unwrap();
    nb.add_page(debug_page(3, "z")).unwrap();
    fs::create_dir_all(dir.join("output")).unwrap();
    nb.resave().unwrap();
    assert_eq!(
        Notebook::open(&dir, None)
            .unwrap()
            .get::<i32>("debug", "a")
            .unwrap(),
        3
    );
    fs::write(dir.join("stray.txt"), "x").unwrap();
    assert!(matches!(nb.resave(), Err(NotebookError::UnexpectedEntry(_))));
}

#[test]
fn test_describe_format() {
    let text = describe("debug").unwrap();
    assert_eq!(
        text,
        "Page name: debug\n\tVariable count: 2\n\tDescription: Page used to exercise the notebook."
    );
    assert!(describe("nothing").is_err());
    assert!(catalogue::page_names().len() == 13);
}

#[test]
fn test_changed_keys() {
    let a = serde_json::json!({"x": 1, "y": 2});
    let b = serde_json::json!({"x": 1, "y": 3, "z": 0});
    assert_eq!(changed_keys(&a, &b), vec!["y".to_string(), "z".to_string()]);
    assert!(changed_keys(&a, &a).is_empty());
}
