//! Data files - typed in-memory representations of files on disk
//!
//! Every file type implements [`DataFile`]: it supplies the type-specific
//! `do_load`/`do_save_as` routines and optionally a magic check, and inherits the
//! shared lifecycle:
//!
//! - `load` resolves a path, rejects empty files, runs the magic check, then the
//!   type-specific load. A file object can be loaded at most once.
//! - `save_as` writes to the given path (or the current/default filename) and
//!   remembers it as the new filename.
//! - `init_default` loads the bundled default file and forgets its path so the
//!   bundled copy is not overwritten by a later `save_as`.

use std::path::{Path, PathBuf};
use crate::pathfinder::DataPathFinder;
use crate::{Error, Result};

/// Lifecycle state shared by all data files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileState {
    filename: Option<PathBuf>,
    loaded: bool,
}

impl FileState {
    /// Unloaded state already pointing at `path`
    pub fn with_filename(path: impl Into<PathBuf>) -> Self {
        Self {
            filename: Some(path.into()),
            loaded: false,
        }
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn set_filename(&mut self, path: Option<PathBuf>) {
        self.filename = path;
    }

    fn mark_loaded(&mut self, path: PathBuf) {
        self.filename = Some(path);
        self.loaded = true;
    }
}

/// A file on disk represented as a typed object
pub trait DataFile {
    /// Identifying name of the file type
    const KIND: &'static str;

    /// Filename used when no path is given; also names the bundled default
    const DEFAULT_FILENAME: Option<&'static str> = None;

    fn state(&self) -> &FileState;

    fn state_mut(&mut self) -> &mut FileState;

    /// Type-specific deserialization
    fn do_load(&mut self, path: &Path) -> Result<()>;

    /// Type-specific serialization
    fn do_save_as(&mut self, path: &Path) -> Result<()>;

    /// Verify the file is of the expected type before `do_load` runs.
    ///
    /// Must fail with [`Error::FormatMismatch`] if it is not.
    fn test_magic(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn filename(&self) -> Option<&Path> {
        self.state().filename()
    }

    fn is_loaded(&self) -> bool {
        self.state().is_loaded()
    }

    /// Load the file at `path` (or the default filename) and register it as filename
    fn load(&mut self, path: Option<&Path>) -> Result<()> {
        if self.is_loaded() {
            let previous = self.filename().map(Path::to_path_buf).unwrap_or_default();
            return Err(Error::AlreadyLoaded(previous));
        }

        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::DEFAULT_FILENAME
                .map(PathBuf::from)
                .ok_or(Error::MissingPath { kind: Self::KIND })?,
        };

        // An empty file could be of almost any type
        if std::fs::metadata(&path)?.len() == 0 {
            return Err(Error::EmptyFile(path));
        }

        self.test_magic(&path)?;
        self.do_load(&path)?;
        self.state_mut().mark_loaded(path);
        Ok(())
    }

    /// Save contents to `path`, falling back to the current then the default filename
    fn save_as(&mut self, path: Option<&Path>) -> Result<()> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| self.filename().map(Path::to_path_buf))
            .or_else(|| Self::DEFAULT_FILENAME.map(PathBuf::from))
            .ok_or(Error::MissingPath { kind: Self::KIND })?;

        self.do_save_as(&path)?;
        self.state_mut().set_filename(Some(path));
        Ok(())
    }

    /// Initialize contents from the bundled default file.
    ///
    /// The filename is reset afterwards so the bundled file is never overwritten.
    fn init_default(&mut self, finder: &DataPathFinder) -> Result<()> {
        let name = Self::DEFAULT_FILENAME.ok_or(Error::NoDefault { kind: Self::KIND })?;
        let fullpath = finder.default_data_path(&[name])?;
        self.load(Some(&fullpath))?;
        self.state_mut().set_filename(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Line-oriented text file whose first line must be `GREETINGS`
    #[derive(Default)]
    struct Greetings {
        state: FileState,
        lines: Vec<String>,
        loads: usize,
    }

    impl DataFile for Greetings {
        const KIND: &'static str = "Greetings";
        const DEFAULT_FILENAME: Option<&'static str> = Some("greetings.txt");

        fn state(&self) -> &FileState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut FileState {
            &mut self.state
        }

        fn test_magic(&self, path: &Path) -> Result<()> {
            let content = std::fs::read_to_string(path)?;
            if content.lines().next() != Some("GREETINGS") {
                return Err(Error::FormatMismatch { path: path.to_path_buf(), kind: Self::KIND });
            }
            Ok(())
        }

        fn do_load(&mut self, path: &Path) -> Result<()> {
            self.loads += 1;
            let content = std::fs::read_to_string(path)?;
            self.lines = content.lines().skip(1).map(str::to_string).collect();
            Ok(())
        }

        fn do_save_as(&mut self, path: &Path) -> Result<()> {
            let mut content = String::from("GREETINGS\n");
            for line in &self.lines {
                content.push_str(line);
                content.push('\n');
            }
            std::fs::write(path, content)?;
            Ok(())
        }
    }

    /// File type without a default filename
    #[derive(Default)]
    struct Anonymous {
        state: FileState,
    }

    impl DataFile for Anonymous {
        const KIND: &'static str = "Anonymous";

        fn state(&self) -> &FileState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut FileState {
            &mut self.state
        }

        fn do_load(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }

        fn do_save_as(&mut self, path: &Path) -> Result<()> {
            std::fs::write(path, b"anonymous")?;
            Ok(())
        }
    }

    #[test]
    fn test_load_registers_filename() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, "GREETINGS\nhello\nworld\n").unwrap();

        let mut file = Greetings::default();
        file.load(Some(&path)).unwrap();
        assert!(file.is_loaded());
        assert_eq!(file.filename(), Some(path.as_path()));
        assert_eq!(file.lines, vec!["hello", "world"]);
    }

    #[test]
    fn test_empty_file_rejected_before_do_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, b"").unwrap();

        let mut file = Greetings::default();
        let err = file.load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::EmptyFile(p) if p == path));
        assert_eq!(file.loads, 0);
        assert!(!file.is_loaded());
        assert!(file.filename().is_none());
    }

    #[test]
    fn test_second_load_fails_and_keeps_state() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        std::fs::write(&first, "GREETINGS\none\n").unwrap();
        std::fs::write(&second, "GREETINGS\ntwo\n").unwrap();

        let mut file = Greetings::default();
        file.load(Some(&first)).unwrap();
        let err = file.load(Some(&second)).unwrap_err();
        assert!(matches!(err, Error::AlreadyLoaded(p) if p == first));
        assert_eq!(file.filename(), Some(first.as_path()));
        assert_eq!(file.lines, vec!["one"]);
        assert_eq!(file.loads, 1);
    }

    #[test]
    fn test_magic_mismatch_leaves_file_unloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.txt");
        std::fs::write(&path, "SOMETHING ELSE\n").unwrap();

        let mut file = Greetings::default();
        let err = file.load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::FormatMismatch { kind: "Greetings", .. }));
        assert_eq!(file.loads, 0);
        assert!(!file.is_loaded());
        assert!(file.filename().is_none());
    }

    #[test]
    fn test_missing_path_without_default() {
        let mut file = Anonymous::default();
        assert!(matches!(file.load(None), Err(Error::MissingPath { kind: "Anonymous" })));
        assert!(matches!(file.save_as(None), Err(Error::MissingPath { .. })));
    }

    #[test]
    fn test_load_nonexistent_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        let mut file = Anonymous::default();
        let err = file.load(Some(&dir.path().join("absent"))).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_save_as_updates_filename() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.txt");

        let mut file = Greetings::default();
        file.lines = vec!["hi".to_string()];
        file.save_as(Some(&target)).unwrap();
        assert_eq!(file.filename(), Some(target.as_path()));

        // No argument writes to the remembered location
        file.lines.push("again".to_string());
        file.save_as(None).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "GREETINGS\nhi\nagain\n");
    }

    #[test]
    fn test_init_default_forgets_bundled_path() {
        let defaults = TempDir::new().unwrap();
        std::fs::write(defaults.path().join("greetings.txt"), "GREETINGS\nbundled\n").unwrap();
        let finder = DataPathFinder::new(defaults.path());

        let mut file = Greetings::default();
        file.init_default(&finder).unwrap();
        assert_eq!(file.lines, vec!["bundled"]);
        assert!(file.filename().is_none());
    }

    #[test]
    fn test_init_default_requires_default_filename() {
        let defaults = TempDir::new().unwrap();
        let finder = DataPathFinder::new(defaults.path());
        let mut file = Anonymous::default();
        assert!(matches!(file.init_default(&finder), Err(Error::NoDefault { kind: "Anonymous" })));
    }

    #[test]
    fn test_init_default_missing_bundle() {
        let defaults = TempDir::new().unwrap();
        let finder = DataPathFinder::new(defaults.path());
        let mut file = Greetings::default();
        assert!(matches!(file.init_default(&finder), Err(Error::PathNotFound(_))));
    }
}
