//! Canonical paths within `.catchmaster/` for a project root.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct GamePaths {
    pub root: PathBuf,
    pub game_dir: PathBuf,
    pub config_path: PathBuf,
    pub history_path: PathBuf,
}

impl GamePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let game_dir = root.join(".catchmaster");
        Self {
            root: root.clone(),
            game_dir: game_dir.clone(),
            config_path: game_dir.join("config.toml"),
            history_path: game_dir.join("history.json"),
        }
    }
}
