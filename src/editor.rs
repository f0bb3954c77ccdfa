use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{QuarkError, Result};
use crate::highlight::{HighlightedDocument, Highlighter};
use crate::preview::Interval;

/// The text of one note together with where it lives on disk.
pub struct NoteEditor {
    file_path: Option<PathBuf>,
    document: HighlightedDocument,
    modified: bool,
    autosave: Option<Interval>,
}

impl NoteEditor {
    pub fn new(highlighter: Highlighter) -> Self {
        Self {
            file_path: None,
            document: HighlightedDocument::new(highlighter),
            modified: false,
            autosave: None,
        }
    }

    /// Saves modified text every `period` while `poll_autosave` is called.
    pub fn with_autosave(mut self, period: Duration, now: Instant) -> Self {
        self.autosave = Some(Interval::new(period, now));
        self
    }

    /// Loads `path` into the buffer. Nothing changes if it can't be read.
    pub fn open(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| QuarkError::io(path, e))?;
        self.document.set_text(&text);
        self.file_path = Some(path.to_path_buf());
        self.modified = false;
        log::debug!("Opened {}", path.display());
        Ok(())
    }

    pub fn save(&mut self) -> Result<()> {
        let path = self.file_path.clone().ok_or(QuarkError::NoFilePath)?;
        self.write_to(&path)?;
        self.modified = false;
        Ok(())
    }

    /// Writes to `path` and makes it the buffer's file.
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        self.write_to(path)?;
        self.file_path = Some(path.to_path_buf());
        self.modified = false;
        Ok(())
    }

    /// Writes to `path` but keeps editing the current file.
    pub fn save_copy_as(&self, path: &Path) -> Result<()> {
        self.write_to(path)
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.document.text()).map_err(|e| QuarkError::io(path, e))?;
        log::debug!("Saved {}", path.display());
        Ok(())
    }

    pub fn set_text(&mut self, text: &str) {
        self.document.set_text(text);
        self.modified = true;
    }

    /// Returns the lines whose highlighting had to be redone.
    pub fn replace_line(&mut self, index: usize, text: &str) -> Range<usize> {
        if index >= self.document.len() {
            return index..index;
        }
        self.modified = true;
        self.document.replace_line(index, text)
    }

    pub fn insert_line(&mut self, index: usize, text: &str) -> Range<usize> {
        self.modified = true;
        self.document.insert_line(index, text)
    }

    /// Adds a line at the end, keeping a trailing newline if there was one.
    pub fn append_line(&mut self, text: &str) -> Range<usize> {
        let last = self.document.len() - 1;
        if self.document.line(last) == Some("") {
            let changed = self.replace_line(last, text);
            self.insert_line(last + 1, "");
            changed
        } else {
            self.insert_line(last + 1, text)
        }
    }

    /// Saves when the autosave period has passed and there is something to
    /// save. Returns true if the file was written.
    pub fn poll_autosave(&mut self, now: Instant) -> Result<bool> {
        let Some(interval) = self.autosave.as_mut() else {
            return Ok(false);
        };
        if !interval.poll(now) || !self.modified || self.file_path.is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn text(&self) -> String {
        self.document.text()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn document(&self) -> &HighlightedDocument {
        &self.document
    }

    pub fn title(&self) -> String {
        let name = self
            .file_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string());
        format!("{name} - Quark")
    }
}

impl Default for NoteEditor {
    fn default() -> Self {
        Self::new(Highlighter::default())
    }
}
