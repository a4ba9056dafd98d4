//! Write-once on-disk store of stage outputs.
//!
//! Layout: `<dir>/_metadata.json`, then one directory per page holding its
//! own `_metadata.json` and one gzip-compressed JSON file per variable.

pub mod catalogue;
pub mod page;

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigError};
use crate::utils::system::{software_version, unix_time_now};

pub use page::NotebookPage;

pub(crate) const METADATA_FILE: &str = "_metadata.json";
pub(crate) const VARIABLE_SUFFIX: &str = ".json.gz";

/// Page exempt from the config requirement.
const DEBUG_PAGE: &str = "debug";

/// Pipeline output directories that may sit beside the pages.
const OUTPUT_DIRS: &[&str] = &["filtered", "output"];

#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown notebook page `{0}`")]
    UnknownPage(String),
    #[error("page `{page}` has no variable `{variable}`")]
    UnknownVariable { page: String, variable: String },
    #[error("variable `{variable}` of page `{page}` is already set")]
    AlreadySet { page: String, variable: String },
    #[error("variable `{variable}` of page `{page}` is not set")]
    Unset { page: String, variable: String },
    #[error("page `{page}` has unset variables: {variables:?}")]
    UnsetVariables {
        page: String,
        variables: Vec<&'static str>,
    },
    #[error("page `{0}` is already in the notebook")]
    PageExists(String),
    #[error("page `{0}` is not in the notebook")]
    PageMissing(String),
    #[error("creating a notebook at {0} requires a config file")]
    ConfigRequired(PathBuf),
    #[error("config file {0} does not exist")]
    ConfigMissing(PathBuf),
    #[error("unexpected entry {0} in notebook directory")]
    UnexpectedEntry(PathBuf),
    #[error("cannot (de)serialise {name}: {message}")]
    Serde { name: String, message: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> NotebookError + '_ {
    move |source| NotebookError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NotebookMetadata {
    time_created: f64,
    version: String,
}

#[derive(Debug)]
pub struct Notebook {
    dir: PathBuf,
    config_path: Option<PathBuf>,
    meta: NotebookMetadata,
    pages: BTreeMap<String, NotebookPage>,
}

impl Notebook {
    /// Loads the notebook at `dir`, creating it when the directory is absent.
    pub fn open(dir: &Path, config_path: Option<&Path>) -> Result<Self, NotebookError> {
        let config_path = config_path.map(Path::to_path_buf);
        if !dir.exists() {
            let Some(config) = &config_path else {
                return Err(NotebookError::ConfigRequired(dir.to_path_buf()));
            };
            if !config.is_file() {
                return Err(NotebookError::ConfigMissing(config.clone()));
            }
            fs::create_dir_all(dir).map_err(io_error(dir))?;
            let meta = NotebookMetadata {
                time_created: unix_time_now(),
                version: software_version().to_string(),
            };
            let meta_path = dir.join(METADATA_FILE);
            let file = File::create(&meta_path).map_err(io_error(&meta_path))?;
            serde_json::to_writer_pretty(file, &meta).map_err(|e| NotebookError::Serde {
                name: meta_path.display().to_string(),
                message: e.to_string(),
            })?;
            info!(dir = %dir.display(), "created notebook");
            return Ok(Self {
                dir: dir.to_path_buf(),
                config_path,
                meta,
                pages: BTreeMap::new(),
            });
        }

        let meta_path = dir.join(METADATA_FILE);
        let file = File::open(&meta_path).map_err(io_error(&meta_path))?;
        let meta: NotebookMetadata =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| NotebookError::Serde {
                name: meta_path.display().to_string(),
                message: e.to_string(),
            })?;
        let mut pages = BTreeMap::new();
        for name in catalogue::page_names() {
            let page_dir = dir.join(name);
            if page_dir.is_dir() {
                let page = NotebookPage::load(&page_dir)?;
                debug!(page = name, "loaded page");
                pages.insert(name.to_string(), page);
            }
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            config_path,
            meta,
            pages,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn time_created(&self) -> f64 {
        self.meta.time_created
    }

    pub fn version(&self) -> &str {
        &self.meta.version
    }

    /// Adds a complete page and writes it to disk.
    pub fn add_page(&mut self, mut page: NotebookPage) -> Result<(), NotebookError> {
        let name = page.name();
        if self.pages.contains_key(name) {
            return Err(NotebookError::PageExists(name.to_string()));
        }
        let unset = page.unset_variables();
        if !unset.is_empty() {
            return Err(NotebookError::UnsetVariables {
                page: name.to_string(),
                variables: unset,
            });
        }
        if name != DEBUG_PAGE {
            let config = self.load_config()?;
            let sections = config.section_values();
            page.meta.config = page
                .spec()
                .config_sections
                .iter()
                .filter_map(|s| sections.get(*s).map(|v| (s.to_string(), v.clone())))
                .collect();
            self.warn_config_changes(&sections);
        }
        page.save(&self.dir.join(name))?;
        info!(page = name, "added notebook page");
        self.pages.insert(name.to_string(), page);
        Ok(())
    }

    pub fn has_page(&self, name: &str) -> Result<bool, NotebookError> {
        if catalogue::find(name).is_none() {
            return Err(NotebookError::UnknownPage(name.to_string()));
        }
        Ok(self.pages.contains_key(name))
    }

    pub fn page(&self, name: &str) -> Result<&NotebookPage, NotebookError> {
        if !self.has_page(name)? {
            return Err(NotebookError::PageMissing(name.to_string()));
        }
        self.pages
            .get(name)
            .ok_or_else(|| NotebookError::PageMissing(name.to_string()))
    }

    /// Shorthand for reading one variable of one page.
    pub fn get<T: serde::de::DeserializeOwned>(
        &self,
        page: &str,
        variable: &str,
    ) -> Result<T, NotebookError> {
        self.page(page)?.get(variable)
    }

    pub fn delete_page(&mut self, name: &str) -> Result<(), NotebookError> {
        if !self.has_page(name)? {
            return Err(NotebookError::PageMissing(name.to_string()));
        }
        let page_dir = self.dir.join(name);
        if page_dir.exists() {
            fs::remove_dir_all(&page_dir).map_err(io_error(&page_dir))?;
        }
        self.pages.remove(name);
        info!(page = name, "deleted notebook page");
        Ok(())
    }

    /// Rewrites every page. Errors on anything in the directory that is not
    /// a known page, a pipeline output directory or the notebook metadata.
    pub fn resave(&self) -> Result<(), NotebookError> {
        let entries = fs::read_dir(&self.dir).map_err(io_error(&self.dir))?;
        for entry in entries {
            let path = entry.map_err(io_error(&self.dir))?.path();
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let expected = if path.is_dir() {
                self.pages.contains_key(&file_name) || OUTPUT_DIRS.contains(&file_name.as_str())
            } else {
                file_name == METADATA_FILE
            };
            if !expected {
                return Err(NotebookError::UnexpectedEntry(path));
            }
        }
        for (name, page) in &self.pages {
            let page_dir = self.dir.join(name);
            fs::remove_dir_all(&page_dir).map_err(io_error(&page_dir))?;
            page.save(&page_dir)?;
        }
        Ok(())
    }

    /// Software version each page was written with.
    pub fn all_versions(&self) -> BTreeMap<String, String> {
        self.pages
            .iter()
            .map(|(k, p)| (k.clone(), p.version().to_string()))
            .collect()
    }

    /// Pages present, in pipeline order.
    pub fn page_names(&self) -> Vec<&'static str> {
        catalogue::page_names()
            .into_iter()
            .filter(|n| self.pages.contains_key(*n))
            .collect()
    }

    pub fn describe(&self, name: &str) -> Result<String, NotebookError> {
        describe(name)
    }

    fn load_config(&self) -> Result<Config, NotebookError> {
        match &self.config_path {
            Some(path) if path.is_file() => Ok(Config::load(path)?),
            Some(path) => Err(NotebookError::ConfigMissing(path.clone())),
            None => Err(NotebookError::ConfigRequired(self.dir.clone())),
        }
    }

    fn warn_config_changes(&self, current: &BTreeMap<String, Value>) {
        for (page_name, page) in &self.pages {
            for (section, saved) in page.config_sections() {
                let Some(now) = current.get(section) else {
                    continue;
                };
                let changed = changed_keys(saved, now);
                if !changed.is_empty() {
                    warn!(
                        page = page_name.as_str(),
                        section = section.as_str(),
                        "config changed since page was created: {}",
                        changed.join(", ")
                    );
                }
            }
        }
    }
}

/// Human-readable description of a catalogue page.
pub fn describe(name: &str) -> Result<String, NotebookError> {
    let spec = catalogue::find(name).ok_or_else(|| NotebookError::UnknownPage(name.to_string()))?;
    Ok(format!(
        "Page name: {}\n\tVariable count: {}\n\tDescription: {}",
        spec.name,
        spec.variables.len(),
        spec.description
    ))
}

fn changed_keys(saved: &Value, now: &Value) -> Vec<String> {
    match (saved, now) {
        (Value::Object(a), Value::Object(b)) => {
            let mut keys: Vec<String> = a
                .iter()
                .filter(|(k, v)| b.get(*k) != Some(*v))
                .map(|(k, _)| k.clone())
                .collect();
            keys.extend(b.keys().filter(|k| !a.contains_key(*k)).cloned());
            keys
        }
        _ if saved != now => vec!["<section>".to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/notebook/mod.rs"]
mod tests;
