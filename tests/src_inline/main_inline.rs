use super::*;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_temp_dir() -> PathBuf {
    let mut dir = std::env::temp_dir();
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.push(format!("coppafish_main_test_{}_{}", std::process::id(), id));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_parse_run() {
    let args = Args::try_parse_from(["coppafish", "run", "--config", "exp/config.json", "-t", "3"])
        .unwrap();
    assert_eq!(args.threads, 3);
    assert!(!args.verbose);
    match args.command {
        SubArgs::Run { config } => assert_eq!(config, PathBuf::from("exp/config.json")),
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_parse_run_requires_config() {
    assert!(Args::try_parse_from(["coppafish", "run"]).is_err());
}

#[test]
fn test_parse_notebook_variable_needs_page() {
    assert!(Args::try_parse_from(["coppafish", "notebook", "--dir", "nb", "--variable", "a"]).is_err());
    let args = Args::try_parse_from([
        "coppafish", "notebook", "--dir", "nb", "--page", "omp", "--variable", "scores", "-v",
    ])
    .unwrap();
    assert!(args.verbose);
    match args.command {
        SubArgs::Notebook { page, variable, .. } => {
            assert_eq!(page.as_deref(), Some("omp"));
            assert_eq!(variable.as_deref(), Some("scores"));
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_parse_codes_and_simulate() {
    let args = Args::try_parse_from([
        "coppafish", "codes", "--genes", "4", "--rounds", "3", "--channels", "3",
    ])
    .unwrap();
    assert!(matches!(
        args.command,
        SubArgs::Codes {
            genes: 4,
            rounds: 3,
            channels: 3,
            out: None
        }
    ));
    let args = Args::try_parse_from(["coppafish", "simulate", "--out", "sim"]).unwrap();
    assert!(matches!(args.command, SubArgs::Simulate { seed: 0, tiles: 2, .. }));
}

#[test]
fn test_notebook_text_lists_and_prints() {
    let root = make_temp_dir();
    let config = root.join("config.json");
    fs::write(
        &config,
        r#"{"file_names": {"notebook_dir": "nb", "tile_dir": "tiles", "code_book": "codes.txt"},
            "basic_info": {"n_tiles": 1, "n_rounds": 2, "n_channels": 2}}"#,
    )
    .unwrap();
    let dir = root.join("nb");
    let mut nb = Notebook::open(&dir, Some(&config)).unwrap();
    let mut page = notebook::NotebookPage::new("debug").unwrap();
    page.set("a", &[1, 2]).unwrap();
    page.set("b", "two").unwrap();
    nb.add_page(page).unwrap();

    let listing = notebook_text(&dir, None, None).unwrap();
    assert!(listing.contains(&format!("[x] debug ({})", nb.version())));
    assert!(listing.contains("[ ] omp"));
    let described = notebook_text(&dir, Some("omp"), None).unwrap();
    assert!(described.starts_with("Page name: omp"));
    let value = notebook_text(&dir, Some("debug"), Some("a")).unwrap();
    let parsed: Vec<i32> = serde_json::from_str(&value).unwrap();
    assert_eq!(parsed, vec![1, 2]);
    assert!(notebook_text(&dir, Some("debug"), Some("c")).is_err());
    assert!(notebook_text(&root.join("missing"), None, None).is_err());
}

#[test]
fn test_parse_notebook_edit_flags() {
    let args = Args::try_parse_from(["coppafish", "notebook", "--dir", "nb", "--delete", "omp"]).unwrap();
    match args.command {
        SubArgs::Notebook { delete, resave, .. } => {
            assert_eq!(delete.as_deref(), Some("omp"));
            assert!(!resave);
        }
        other => panic!("unexpected command {:?}", other),
    }
    assert!(Args::try_parse_from([
        "coppafish", "notebook", "--dir", "nb", "--delete", "omp", "--page", "omp"
    ])
    .is_err());
    assert!(Args::try_parse_from(["coppafish", "notebook", "--dir", "nb", "--resave", "--page", "omp"]).is_err());
}

#[test]
fn test_edit_notebook_deletes_and_resaves() {
    let root = make_temp_dir();
    let config = root.join("config.json");
    fs::write(
        &config,
        r#"{"file_names": {"notebook_dir": "nb", "tile_dir": "tiles", "code_book": "codes.txt"},
            "basic_info": {"n_tiles": 1, "n_rounds": 2, "n_channels": 2}}"#,
    )
    .unwrap();
    let dir = root.join("nb");
    let mut nb = Notebook::open(&dir, Some(&config)).unwrap();
    let mut page = notebook::NotebookPage::new("debug").unwrap();
    page.set("a", &5).unwrap();
    page.set("b", "five").unwrap();
    nb.add_page(page).unwrap();

    edit_notebook(&dir, None, true).unwrap();
    assert_eq!(Notebook::open(&dir, None).unwrap().get::<i32>("debug", "a").unwrap(), 5);

    edit_notebook(&dir, Some("debug"), false).unwrap();
    assert!(!dir.join("debug").exists());
    assert!(notebook_text(&dir, None, None).unwrap().contains("[ ] debug"));
    assert!(edit_notebook(&dir, Some("debug"), false).is_err());
    assert!(edit_notebook(&dir, Some("bogus"), false).is_err());
}
