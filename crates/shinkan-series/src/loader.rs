//! Series definition loading from TOML files.
//!
//! This module handles loading series definitions from the
//! `series-definitions/` directory.

use crate::{
    definition::SeriesDefinition,
    error::{Result, SeriesError},
};
use shinkan_core::SeriesId;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loader for series definitions from TOML files.
pub struct SeriesLoader {
    /// Base directory containing series definitions
    definitions_dir: PathBuf,
}

impl SeriesLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(SeriesError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Load a single series definition by ID.
    ///
    /// # Errors
    /// Returns error if the definition file doesn't exist, can't be read,
    /// or is invalid.
    pub fn load(&self, series_id: &SeriesId) -> Result<SeriesDefinition> {
        let filename = format!("{}.toml", series_id.as_str());
        let path = Self::find_file(&self.definitions_dir, &filename)?.ok_or_else(|| {
            SeriesError::NotFound {
                series_id: series_id.to_string(),
            }
        })?;

        let definition = Self::load_from_path(&path)?;
        definition.validate()?;

        debug!(
            series_id = %series_id,
            title = %definition.title,
            "loaded series definition"
        );

        Ok(definition)
    }

    /// Load all series definitions from the definitions directory.
    ///
    /// Invalid definitions are logged as warnings and skipped.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_all(&self) -> Result<Vec<SeriesDefinition>> {
        let mut definitions = Vec::new();

        Self::walk_and_load(&self.definitions_dir, &mut definitions)?;

        info!(
            count = definitions.len(),
            dir = %self.definitions_dir.display(),
            "loaded series definitions"
        );

        Ok(definitions)
    }

    /// Recursively walk the directory and load all TOML files.
    fn walk_and_load(dir: &Path, definitions: &mut Vec<SeriesDefinition>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                Self::walk_and_load(&path, definitions)?;
            } else if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                match Self::load_from_path(&path) {
                    Ok(definition) => {
                        if let Err(e) = definition.validate() {
                            warn!(
                                path = %path.display(),
                                error = %e,
                                "skipping invalid series definition"
                            );
                            continue;
                        }
                        definitions.push(definition);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "failed to load series definition"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Recursively search for a file by name.
    fn find_file(dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                if let Some(found) = Self::find_file(&path, filename)? {
                    return Ok(Some(found));
                }
            } else if path.file_name().and_then(|s| s.to_str()) == Some(filename) {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    /// Load a series definition from a specific file path.
    fn load_from_path(path: &Path) -> Result<SeriesDefinition> {
        let contents = std::fs::read_to_string(path).map_err(|e| SeriesError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        toml::from_str(&contents).map_err(|e| SeriesError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_definition(dir: &Path, id: &str) -> PathBuf {
        let file_path = dir.join(format!("{id}.toml"));
        let content = format!(
            r#"
id = "{id}"
title = "泥の国"
search_key = "泥の国"
kind = "comic"
translated_title = "Land of Mud"
"#
        );
        std::fs::write(&file_path, content).expect("write test file");
        file_path
    }

    #[test]
    fn test_loader_new_with_existing_dir() {
        let temp_dir = TempDir::new().expect("create temp dir");
        assert!(SeriesLoader::new(temp_dir.path()).is_ok());
    }

    #[test]
    fn test_loader_new_with_nonexistent_dir() {
        assert!(SeriesLoader::new("/nonexistent/path/to/definitions").is_err());
    }

    #[test]
    fn test_load_single_series() {
        let temp_dir = TempDir::new().expect("create temp dir");
        write_definition(temp_dir.path(), "mud-country-comic");

        let loader = SeriesLoader::new(temp_dir.path()).expect("create loader");
        let series_id = SeriesId::new("mud-country-comic").expect("valid series ID");
        let definition = loader.load(&series_id).expect("load series definition");

        assert_eq!(definition.id(), &series_id);
        assert_eq!(definition.title, "泥の国");
    }

    #[test]
    fn test_load_nonexistent_series() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let loader = SeriesLoader::new(temp_dir.path()).expect("create loader");
        let series_id = SeriesId::new("nope").expect("valid series ID");

        let result = loader.load(&series_id);
        assert!(matches!(result.unwrap_err(), SeriesError::NotFound { .. }));
    }

    #[test]
    fn test_load_all_from_nested_dirs() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let nested = temp_dir.path().join("comics");
        std::fs::create_dir_all(&nested).expect("create nested dir");

        write_definition(temp_dir.path(), "series-one");
        write_definition(&nested, "series-two");

        let loader = SeriesLoader::new(temp_dir.path()).expect("create loader");
        let definitions = loader.load_all().expect("load all definitions");
        assert_eq!(definitions.len(), 2);
    }

    #[test]
    fn test_load_all_skips_invalid() {
        let temp_dir = TempDir::new().expect("create temp dir");
        write_definition(temp_dir.path(), "valid-series");
        std::fs::write(temp_dir.path().join("broken.toml"), "not toml [[[")
            .expect("write invalid file");

        let loader = SeriesLoader::new(temp_dir.path()).expect("create loader");
        let definitions = loader.load_all().expect("load all definitions");
        assert_eq!(definitions.len(), 1);
    }
}
