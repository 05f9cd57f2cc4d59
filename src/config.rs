use crate::error::Result;
use crate::practice::{SelectionOptions, SelectionTuning};
use crate::recognition::{FeatureTuning, Mode, ScoringTuning};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Mode used when a caller does not pick one
    pub mode: Mode,
    pub avoid_recent: bool,
    pub use_progress_weighting: bool,
    pub features: FeatureTuning,
    pub scoring: ScoringTuning,
    pub selection: SelectionTuning,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Lenient,
            avoid_recent: true,
            use_progress_weighting: true,
            features: FeatureTuning::default(),
            scoring: ScoringTuning::default(),
            selection: SelectionTuning::default(),
        }
    }
}

impl Config {
    /// Selection options carrying the configured defaults and no filters
    pub fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            difficulty: None,
            category: None,
            avoid_recent: self.avoid_recent,
            use_progress_weighting: self.use_progress_weighting,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "kakitori") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("kakitori_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
