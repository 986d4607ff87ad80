//! Typed configuration files
//!
//! On disk a configuration file is a magic comment line naming its kind, a short
//! comment header, then a TOML body:
//!
//! ```text
//! # -*- f312: RunConfig -*-
//! #
//! # @ Now @ 2024-05-01 10:00:00
//! #
//! title = "sun"
//! ```
//!
//! The body is parsed into a typed struct; nothing in the file is executed.

use std::path::Path;
use std::sync::OnceLock;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::datafile::{DataFile, FileState};
use crate::pathfinder::DataPathFinder;
use crate::{Error, Result};

static MAGIC: OnceLock<Regex> = OnceLock::new();

/// Kind named by a magic line such as `# -*- f312: RunConfig -*-`
fn magic_kind(line: &str) -> Option<&str> {
    MAGIC
        .get_or_init(|| {
            // Constant pattern
            Regex::new(r"^\s*#\s*-\*-\s*f312:\s*(\S+?)\s*-\*-").expect("magic pattern compiles")
        })
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Contents of a configuration file kind.
///
/// Mark the struct `#[serde(default)]` so missing fields take their defaults.
pub trait ConfigSchema: Serialize + DeserializeOwned + Default {
    const KIND: &'static str;

    const DEFAULT_FILENAME: Option<&'static str> = None;
}

/// Configuration file holding a `T`
#[derive(Debug, Clone, Default)]
pub struct ConfigFile<T: ConfigSchema> {
    state: FileState,
    obj: T,
}

impl<T: ConfigSchema> ConfigFile<T> {
    pub fn new() -> Self {
        Self {
            state: FileState::default(),
            obj: T::default(),
        }
    }

    pub fn from_obj(obj: T) -> Self {
        Self {
            state: FileState::default(),
            obj,
        }
    }

    pub fn obj(&self) -> &T {
        &self.obj
    }

    pub fn obj_mut(&mut self) -> &mut T {
        &mut self.obj
    }

    pub fn into_obj(self) -> T {
        self.obj
    }

    /// First line of every file of this kind, without the newline
    pub fn magic_line() -> String {
        format!("# -*- f312: {} -*-", T::KIND)
    }

    fn header() -> String {
        format!(
            "{}\n#\n# @ Now @ {}\n#\n",
            Self::magic_line(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )
    }
}

impl<T: ConfigSchema> DataFile for ConfigFile<T> {
    const KIND: &'static str = T::KIND;
    const DEFAULT_FILENAME: Option<&'static str> = T::DEFAULT_FILENAME;

    fn state(&self) -> &FileState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut FileState {
        &mut self.state
    }

    fn test_magic(&self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let first = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
        let first = String::from_utf8_lossy(first);

        if magic_kind(&first) != Some(T::KIND) {
            return Err(Error::FormatMismatch { path: path.to_path_buf(), kind: T::KIND });
        }
        Ok(())
    }

    fn do_load(&mut self, path: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(path)?;
        self.obj = toml::from_str(&contents).map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(())
    }

    fn do_save_as(&mut self, path: &Path) -> Result<()> {
        let body = toml::to_string_pretty(&self.obj).map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(path, format!("{}{}", Self::header(), body))?;
        Ok(())
    }

    /// A fresh object already holds the defaults
    fn init_default(&mut self, _finder: &DataPathFinder) -> Result<()> {
        self.obj = T::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct RunConfig {
        title: String,
        llzero: f64,
        logging: bool,
        species: Vec<String>,
    }

    impl Default for RunConfig {
        fn default() -> Self {
            Self {
                title: "untitled".to_string(),
                llzero: 4000.0,
                logging: true,
                species: Vec::new(),
            }
        }
    }

    impl ConfigSchema for RunConfig {
        const KIND: &'static str = "RunConfig";
        const DEFAULT_FILENAME: Option<&'static str> = Some("run.toml");
    }

    #[test]
    fn test_save_writes_magic_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        let mut file = ConfigFile::<RunConfig>::new();
        file.obj_mut().title = "sun".to_string();
        file.save_as(Some(&path)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# -*- f312: RunConfig -*-\n"));
        assert!(text.contains("# @ Now @ "));
        assert!(text.contains("title = \"sun\""));
    }

    #[test]
    fn test_saved_file_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        let obj = RunConfig {
            title: "arcturus".to_string(),
            llzero: 5000.0,
            logging: false,
            species: vec!["FeI".to_string(), "CN".to_string()],
        };
        ConfigFile::from_obj(obj.clone()).save_as(Some(&path)).unwrap();

        let mut loaded = ConfigFile::<RunConfig>::new();
        loaded.load(Some(&path)).unwrap();
        assert_eq!(loaded.obj(), &obj);
        assert_eq!(loaded.filename(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "  #  -*-  f312:  RunConfig  -*-\nllzero = 6000.0\n").unwrap();

        let mut file = ConfigFile::<RunConfig>::new();
        file.load(Some(&path)).unwrap();
        assert_eq!(file.obj().llzero, 6000.0);
        assert_eq!(file.obj().title, "untitled");
        assert!(file.obj().logging);
    }

    #[test]
    fn test_magic_kind_parsing() {
        assert_eq!(magic_kind("# -*- f312: RunConfig -*-"), Some("RunConfig"));
        assert_eq!(magic_kind("\t#-*-f312:RunConfig-*-"), Some("RunConfig"));
        assert_eq!(magic_kind("# -*- coding: utf-8 -*-"), None);
        assert_eq!(magic_kind("title = \"x\""), None);
        assert_eq!(magic_kind(&ConfigFile::<RunConfig>::magic_line()), Some("RunConfig"));
    }

    #[test]
    fn test_wrong_kind_is_format_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.toml");
        std::fs::write(&path, "# -*- f312: OtherConfig -*-\ntitle = \"x\"\n").unwrap();

        let mut file = ConfigFile::<RunConfig>::new();
        let err = file.load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { kind: "RunConfig", .. }));
        assert!(!file.is_loaded());
    }

    #[test]
    fn test_bad_body_is_deserialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "# -*- f312: RunConfig -*-\nllzero = \"not a number\"\n").unwrap();

        let mut file = ConfigFile::<RunConfig>::new();
        assert!(matches!(file.load(Some(&path)), Err(Error::Deserialization(_))));
        assert_eq!(file.obj(), &RunConfig::default());
        assert!(!file.is_loaded());
    }

    #[test]
    fn test_init_default_resets_contents() {
        let finder = DataPathFinder::new("unused");
        let mut file = ConfigFile::<RunConfig>::new();
        file.obj_mut().title = "changed".to_string();
        file.init_default(&finder).unwrap();
        assert_eq!(file.obj(), &RunConfig::default());
        assert!(file.filename().is_none());
    }
}
