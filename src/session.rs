//! UI state remembered between runs: last opened note, panel layout and view flags.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{QuarkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    View,
    Edit,
    #[default]
    EditView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub last_note: Option<PathBuf>,
    #[serde(default = "default_show_note_manager")]
    pub show_note_manager: bool,
    /// Editor above preview instead of side by side.
    #[serde(default)]
    pub vertical_layout: bool,
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default = "default_word_wrap")]
    pub word_wrap: bool,
    #[serde(default = "default_sync_scroll")]
    pub sync_scroll: bool,
}

fn default_show_note_manager() -> bool { true }
fn default_word_wrap() -> bool { true }
fn default_sync_scroll() -> bool { true }

impl Default for Session {
    fn default() -> Self {
        Self {
            last_note: None,
            show_note_manager: default_show_note_manager(),
            vertical_layout: false,
            view_mode: ViewMode::default(),
            word_wrap: default_word_wrap(),
            sync_scroll: default_sync_scroll(),
        }
    }
}

impl Session {
    pub fn session_path() -> PathBuf { Config::config_dir().join("session.toml") }

    /// Read at startup. A missing or unreadable session is not an error.
    pub fn load() -> Self {
        let path = Self::session_path();
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            log::warn!("{e}; starting with a fresh session");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| QuarkError::io(path, e))?;
        toml::from_str(&content).map_err(|source| QuarkError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Written at shutdown.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::session_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| QuarkError::io(dir, e))?;
        }
        fs::write(path, toml::to_string_pretty(self)?).map_err(|e| QuarkError::io(path, e))
    }

    /// The last note, but only while it still exists on disk.
    pub fn last_existing_note(&self) -> Option<&Path> {
        self.last_note.as_deref().filter(|p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.toml");

        let session = Session {
            last_note: Some(PathBuf::from("/notes/todo.md")),
            show_note_manager: false,
            vertical_layout: true,
            view_mode: ViewMode::View,
            word_wrap: false,
            sync_scroll: false,
        };
        session.save_to(&path).unwrap();

        assert_eq!(Session::load_from(&path).unwrap(), session);
    }

    #[test]
    fn test_view_mode_serialized_snake_case() {
        let session = Session { view_mode: ViewMode::EditView, ..Session::default() };
        let text = toml::to_string(&session).unwrap();
        assert!(text.contains("view_mode = \"edit_view\""));
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let session: Session = toml::from_str("").unwrap();
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_last_existing_note_ignores_deleted_files() {
        let dir = TempDir::new().unwrap();
        let note = dir.path().join("a.md");
        fs::write(&note, "x").unwrap();

        let mut session = Session { last_note: Some(note.clone()), ..Session::default() };
        assert_eq!(session.last_existing_note(), Some(note.as_path()));

        session.last_note = Some(dir.path().join("missing.md"));
        assert!(session.last_existing_note().is_none());
    }
}
