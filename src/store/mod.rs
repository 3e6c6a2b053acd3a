use std::{
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to write preferences file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// UI state shared by every screen.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[derive(TS)]
#[ts(export)]
pub struct Preferences {
    /// Tool ids in the order they were favorited.
    #[serde(default, rename = "taskplex_favorites")]
    pub favorites: Vec<String>,

    #[serde(default, rename = "taskplex_sidebar_collapsed")]
    pub sidebar_collapsed: bool,
}

/// Preferences bound to their file. Every mutation is written through.
#[derive(Debug)]
pub struct PreferencesStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PreferencesStore {
    /// Reads the file at `path`; a missing or unreadable file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        let prefs = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Preferences>(&raw) {
                Ok(mut prefs) => {
                    dedup(&mut prefs.favorites);
                    prefs
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt preferences file, using defaults");
                    Preferences::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read preferences file");
                Preferences::default()
            }
        };

        PreferencesStore { path, prefs }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn favorites(&self) -> &[String] {
        &self.prefs.favorites
    }

    pub fn is_favorite(&self, tool_id: &str) -> bool {
        self.prefs.favorites.iter().any(|id| id == tool_id)
    }

    pub fn is_collapsed(&self) -> bool {
        self.prefs.sidebar_collapsed
    }

    /// Adds or removes `tool_id`; returns whether it is a favorite afterwards.
    pub fn toggle_favorite(&mut self, tool_id: &str) -> Result<bool> {
        let now_favorite = match self.prefs.favorites.iter().position(|id| id == tool_id) {
            Some(index) => {
                self.prefs.favorites.remove(index);
                false
            }
            None => {
                self.prefs.favorites.push(tool_id.to_string());
                true
            }
        };

        self.save()?;
        Ok(now_favorite)
    }

    pub fn toggle_sidebar(&mut self) -> Result<bool> {
        self.set_collapsed(!self.prefs.sidebar_collapsed)?;
        Ok(self.prefs.sidebar_collapsed)
    }

    pub fn set_collapsed(&mut self, collapsed: bool) -> Result<()> {
        self.prefs.sidebar_collapsed = collapsed;
        self.save()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.prefs = Preferences::default();
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let encoded = serde_json::to_string_pretty(&self.prefs)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut file = File::create(&self.path).map_err(write_err)?;
        file.write_all(encoded.as_bytes()).map_err(write_err)?;

        debug!(path = %self.path.display(), "Preferences saved");
        Ok(())
    }
}

fn dedup(favorites: &mut Vec<String>) {
    let mut seen = Vec::with_capacity(favorites.len());
    favorites.retain(|id| {
        if seen.contains(id) {
            false
        } else {
            seen.push(id.clone());
            true
        }
    });
}
