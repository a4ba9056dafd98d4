use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::catalogue::{self, PageSpec};
use super::{METADATA_FILE, NotebookError, VARIABLE_SUFFIX, io_error};
use crate::utils::system::{software_version, unix_time_now};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PageMetadata {
    pub name: String,
    pub time_created: f64,
    pub version: String,
    /// Config sections as they were when the page was added.
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

/// One stage's output: a fixed set of named variables, each set once.
#[derive(Debug, Clone)]
pub struct NotebookPage {
    spec: &'static PageSpec,
    pub(crate) meta: PageMetadata,
    variables: BTreeMap<String, Value>,
}

impl NotebookPage {
    pub fn new(name: &str) -> Result<Self, NotebookError> {
        let spec =
            catalogue::find(name).ok_or_else(|| NotebookError::UnknownPage(name.to_string()))?;
        Ok(Self {
            spec,
            meta: PageMetadata {
                name: name.to_string(),
                time_created: unix_time_now(),
                version: software_version().to_string(),
                config: BTreeMap::new(),
            },
            variables: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn spec(&self) -> &'static PageSpec {
        self.spec
    }

    pub fn version(&self) -> &str {
        &self.meta.version
    }

    pub fn time_created(&self) -> f64 {
        self.meta.time_created
    }

    /// Config sections recorded when the page was added to a notebook.
    pub fn config_sections(&self) -> &BTreeMap<String, Value> {
        &self.meta.config
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), NotebookError> {
        self.check_variable(name)?;
        if self.variables.contains_key(name) {
            return Err(NotebookError::AlreadySet {
                page: self.name().to_string(),
                variable: name.to_string(),
            });
        }
        let value = serde_json::to_value(value).map_err(|e| NotebookError::Serde {
            name: format!("{}.{}", self.name(), name),
            message: e.to_string(),
        })?;
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Sets one variable per field of a serialisable struct.
    pub fn set_all<T: Serialize>(&mut self, value: &T) -> Result<(), NotebookError> {
        let value = serde_json::to_value(value).map_err(|e| NotebookError::Serde {
            name: self.name().to_string(),
            message: e.to_string(),
        })?;
        let Value::Object(fields) = value else {
            return Err(NotebookError::Serde {
                name: self.name().to_string(),
                message: "expected a struct".to_string(),
            });
        };
        for (k, v) in fields {
            self.set(&k, &v)?;
        }
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, NotebookError> {
        let value = self.get_value(name)?;
        T::deserialize(value).map_err(|e| NotebookError::Serde {
            name: format!("{}.{}", self.name(), name),
            message: e.to_string(),
        })
    }

    pub fn get_value(&self, name: &str) -> Result<&Value, NotebookError> {
        self.check_variable(name)?;
        self.variables.get(name).ok_or_else(|| NotebookError::Unset {
            page: self.name().to_string(),
            variable: name.to_string(),
        })
    }

    /// Rebuilds a struct whose fields are the page variables.
    pub fn get_all<T: DeserializeOwned>(&self) -> Result<T, NotebookError> {
        let map: serde_json::Map<String, Value> = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        T::deserialize(Value::Object(map)).map_err(|e| NotebookError::Serde {
            name: self.name().to_string(),
            message: e.to_string(),
        })
    }

    pub fn unset_variables(&self) -> Vec<&'static str> {
        self.spec
            .variables
            .iter()
            .map(|(v, _)| *v)
            .filter(|v| !self.variables.contains_key(*v))
            .collect()
    }

    fn check_variable(&self, name: &str) -> Result<(), NotebookError> {
        if self.spec.has_variable(name) {
            Ok(())
        } else {
            Err(NotebookError::UnknownVariable {
                page: self.name().to_string(),
                variable: name.to_string(),
            })
        }
    }

    pub(crate) fn save(&self, dir: &Path) -> Result<(), NotebookError> {
        fs::create_dir_all(dir).map_err(io_error(dir))?;
        let meta_path = dir.join(METADATA_FILE);
        let file = File::create(&meta_path).map_err(io_error(&meta_path))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.meta).map_err(|e| {
            NotebookError::Serde {
                name: meta_path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        for (name, value) in &self.variables {
            let path = dir.join(format!("{}{}", name, VARIABLE_SUFFIX));
            let file = File::create(&path).map_err(io_error(&path))?;
            let mut gz = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut gz, value).map_err(|e| NotebookError::Serde {
                name: path.display().to_string(),
                message: e.to_string(),
            })?;
            let mut inner = gz.finish().map_err(io_error(&path))?;
            inner.flush().map_err(io_error(&path))?;
        }
        Ok(())
    }

    pub(crate) fn load(dir: &Path) -> Result<Self, NotebookError> {
        let meta_path = dir.join(METADATA_FILE);
        let file = File::open(&meta_path).map_err(io_error(&meta_path))?;
        let meta: PageMetadata =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| NotebookError::Serde {
                name: meta_path.display().to_string(),
                message: e.to_string(),
            })?;
        let mut page = NotebookPage::new(&meta.name)?;
        page.meta = meta;

        let entries = fs::read_dir(dir).map_err(io_error(dir))?;
        for entry in entries {
            let path = entry.map_err(io_error(dir))?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(variable) = file_name.strip_suffix(VARIABLE_SUFFIX) else {
                continue;
            };
            page.check_variable(variable)?;
            let file = File::open(&path).map_err(io_error(&path))?;
            let value: Value = serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
                .map_err(|e| NotebookError::Serde {
                    name: path.display().to_string(),
                    message: e.to_string(),
                })?;
            page.variables.insert(variable.to_string(), value);
        }
        Ok(page)
    }
}
