use std::path::{Path, PathBuf};

/// Index of a note in the manager's flat note list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteId(pub usize);

/// Index of a notebook in the manager's flat notebook list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotebookId(pub usize);

/// A position in the note manager tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Note(NoteId),
    Notebook(NotebookId),
}

/// What kind of icon a front end should draw for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconHint {
    Notebook,
    Markdown,
    Text,
    File,
}

impl IconHint {
    pub fn for_file(path: &Path) -> Self {
        match path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .as_deref()
        {
            Some("md" | "markdown" | "mdown" | "mkd") => Self::Markdown,
            Some("txt" | "text") | None => Self::Text,
            Some(_) => Self::File,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Notebook => "▸",
            Self::Markdown => "✎",
            Self::Text => "¶",
            Self::File => "·",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Note {
    pub path: PathBuf,
    pub name: String,
    pub icon: IconHint,
    /// Owning notebook, `None` for notes directly under the notes root.
    pub notebook: Option<NotebookId>,
}

impl Note {
    pub fn new(path: PathBuf, notebook: Option<NotebookId>) -> Self {
        Self {
            name: file_name(&path),
            icon: IconHint::for_file(&path),
            path,
            notebook,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notebook {
    pub path: PathBuf,
    pub name: String,
    pub notes: Vec<NoteId>,
}

impl Notebook {
    pub fn new(path: PathBuf) -> Self {
        Self { name: file_name(&path), path, notes: Vec::new() }
    }

    pub fn note_at(&self, row: usize) -> Option<NoteId> {
        self.notes.get(row).copied()
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
