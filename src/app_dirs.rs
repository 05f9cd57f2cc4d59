use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(PathBuf::from(home).join(".local").join("state").join("kakitori"))
        } else {
            ProjectDirs::from("", "", "kakitori").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    /// Default location of the practice database
    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("practice.db"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "kakitori").map(|pd| pd.config_dir().join("config.json"))
    }
}
