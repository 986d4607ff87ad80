use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct F312Config {
    /// Base directory of bundled default data files
    pub defaults_dir: Option<String>,
    /// Where local copies of default files are written
    pub work_dir: Option<String>,
    /// Auto-commit mode for new key-value stores
    pub auto_commit: Option<bool>,
}

impl F312Config {
    pub fn defaults_dir(&self) -> Option<PathBuf> {
        self.defaults_dir.as_deref().map(PathBuf::from)
    }

    pub fn work_dir(&self) -> Option<PathBuf> {
        self.work_dir.as_deref().map(PathBuf::from)
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit.unwrap_or(true)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("f312.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<F312Config>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: F312Config = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &F312Config, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
