//! Error types shared by the note manager, editor buffer and renderer.

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong outside of the highlighter.
#[derive(Debug, Error)]
pub enum QuarkError {
    /// A filesystem operation failed.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config or session file exists but is not valid TOML for us.
    #[error("Failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize settings: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// The notes directory is missing and the user chose not to create it.
    #[error("Notes directory {0} does not exist and was not created")]
    NotesDirDeclined(PathBuf),

    /// The selected note or notebook disappeared before we could act on it.
    #[error("{0} no longer exists")]
    Vanished(PathBuf),

    #[error("{0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Plain `save` on a buffer that was never given a file.
    #[error("Note has no file path yet")]
    NoFilePath,

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The file watcher could not be set up.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Errors raised while turning markdown into HTML.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A fenced code block names a language syntect does not know.
    #[error("Unknown lexer: {0}")]
    UnknownLexer(String),

    #[error("Highlighting failed: {0}")]
    Highlight(#[from] syntect::Error),
}

pub type Result<T> = std::result::Result<T, QuarkError>;

impl QuarkError {
    /// Wraps an `io::Error` together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Short message for the command line.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { path, source } => format!("Could not access {}: {source}", path.display()),
            Self::ConfigParse { path, .. } => format!("Settings file {} is malformed", path.display()),
            Self::ConfigWrite(e) => format!("Could not write settings: {e}"),
            Self::NotesDirDeclined(_) => "No notes directory, nothing to do".to_string(),
            Self::Vanished(path) => format!("{} was moved or deleted", path.display()),
            Self::AlreadyExists(path) => format!("{} already exists", path.display()),
            Self::InvalidName(name) => format!("'{name}' is not a valid name"),
            Self::NotFound(what) => format!("Could not find {what}"),
            Self::NoFilePath => "Choose a file to save to first".to_string(),
            Self::Render(e) => format!("Could not render note: {e}"),
            Self::Watch(e) => format!("Could not watch note: {e}"),
        }
    }
}
