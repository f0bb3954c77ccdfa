//! The note manager: a two-level view of the notes directory.
//!
//! Files directly under the root are notes, directories directly under the
//! root are notebooks, and files directly inside a notebook are that
//! notebook's notes. Anything deeper is ignored. Root notes are listed before
//! notebooks; otherwise the filesystem enumeration order is kept.
//!
//! `NoteId`/`NotebookId` index the lists of the current generation only;
//! look items up again (by path or name) after a refresh.

mod model;

pub use model::{IconHint, ItemRef, Note, NoteId, Notebook, NotebookId};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::error::{QuarkError, Result};

/// Sent to subscribers whenever the listing is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    Reset { generation: u64, notes: usize, notebooks: usize },
}

pub struct NoteManager {
    root: PathBuf,
    notes: Vec<Note>,
    root_notes: Vec<NoteId>,
    notebooks: Vec<Notebook>,
    generation: u64,
    subscribers: Vec<Sender<ManagerEvent>>,
}

impl NoteManager {
    /// Opens the manager on `root`. When the directory is missing, `prompt`
    /// decides whether it gets created.
    pub fn open(root: impl Into<PathBuf>, prompt: impl FnOnce(&Path) -> bool) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            if !prompt(&root) {
                return Err(QuarkError::NotesDirDeclined(root));
            }
            fs::create_dir_all(&root).map_err(|e| QuarkError::io(&root, e))?;
            log::info!("Created notes directory {}", root.display());
        }

        let mut manager = Self {
            root,
            notes: Vec::new(),
            root_notes: Vec::new(),
            notebooks: Vec::new(),
            generation: 0,
            subscribers: Vec::new(),
        };
        manager.refresh()?;
        Ok(manager)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of completed rebuilds.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe(&mut self) -> Receiver<ManagerEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Rebuilds the whole listing from disk. On failure the previous listing
    /// is kept.
    pub fn refresh(&mut self) -> Result<()> {
        let mut notes = Vec::new();
        let mut root_notes = Vec::new();
        let mut notebooks: Vec<Notebook> = Vec::new();

        for path in visible_entries(&self.root)? {
            if path.is_dir() {
                let id = NotebookId(notebooks.len());
                let mut notebook = Notebook::new(path);
                match visible_entries(&notebook.path) {
                    Ok(children) => {
                        for child in children.into_iter().filter(|p| p.is_file()) {
                            notebook.notes.push(NoteId(notes.len()));
                            notes.push(Note::new(child, Some(id)));
                        }
                    }
                    Err(e) => log::warn!("Skipping contents of notebook: {e}"),
                }
                notebooks.push(notebook);
            } else if path.is_file() {
                root_notes.push(NoteId(notes.len()));
                notes.push(Note::new(path, None));
            }
        }

        self.notes = notes;
        self.root_notes = root_notes;
        self.notebooks = notebooks;
        self.generation += 1;

        log::debug!(
            "Scanned {}: {} notes, {} notebooks",
            self.root.display(),
            self.notes.len(),
            self.notebooks.len()
        );

        let event = ManagerEvent::Reset {
            generation: self.generation,
            notes: self.notes.len(),
            notebooks: self.notebooks.len(),
        };
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        Ok(())
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn notebooks(&self) -> &[Notebook] {
        &self.notebooks
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(id.0)
    }

    pub fn notebook(&self, id: NotebookId) -> Option<&Notebook> {
        self.notebooks.get(id.0)
    }

    // ------------------------------------------------------------------
    // Position lookup. `parent == None` means the root.
    // ------------------------------------------------------------------

    pub fn row_count(&self, parent: Option<ItemRef>) -> usize {
        match parent {
            None => self.root_notes.len() + self.notebooks.len(),
            Some(ItemRef::Notebook(id)) => self.notebook(id).map_or(0, Notebook::note_count),
            Some(ItemRef::Note(_)) => 0,
        }
    }

    pub fn item_at(&self, row: usize, parent: Option<ItemRef>) -> Option<ItemRef> {
        match parent {
            None => {
                if let Some(id) = self.root_notes.get(row) {
                    Some(ItemRef::Note(*id))
                } else {
                    let index = row - self.root_notes.len();
                    (index < self.notebooks.len()).then_some(ItemRef::Notebook(NotebookId(index)))
                }
            }
            Some(ItemRef::Notebook(id)) => self.notebook(id)?.note_at(row).map(ItemRef::Note),
            Some(ItemRef::Note(_)) => None,
        }
    }

    pub fn parent_of(&self, item: ItemRef) -> Option<ItemRef> {
        match item {
            ItemRef::Note(id) => self.note(id)?.notebook.map(ItemRef::Notebook),
            ItemRef::Notebook(_) => None,
        }
    }

    /// Row of `item` inside its parent.
    pub fn row_of(&self, item: ItemRef) -> Option<usize> {
        match item {
            ItemRef::Note(id) => match self.note(id)?.notebook {
                Some(nb) => self.notebook(nb)?.notes.iter().position(|n| *n == id),
                None => self.root_notes.iter().position(|n| *n == id),
            },
            ItemRef::Notebook(id) => (id.0 < self.notebooks.len()).then(|| self.root_notes.len() + id.0),
        }
    }

    pub fn name(&self, item: ItemRef) -> Option<&str> {
        match item {
            ItemRef::Note(id) => self.note(id).map(|n| n.name.as_str()),
            ItemRef::Notebook(id) => self.notebook(id).map(|nb| nb.name.as_str()),
        }
    }

    pub fn icon(&self, item: ItemRef) -> Option<IconHint> {
        match item {
            ItemRef::Note(id) => self.note(id).map(|n| n.icon),
            ItemRef::Notebook(id) => self.notebook(id).map(|_| IconHint::Notebook),
        }
    }

    pub fn path(&self, item: ItemRef) -> Option<&Path> {
        match item {
            ItemRef::Note(id) => self.note(id).map(|n| n.path.as_path()),
            ItemRef::Notebook(id) => self.notebook(id).map(|nb| nb.path.as_path()),
        }
    }

    pub fn find_by_path(&self, path: &Path) -> Option<ItemRef> {
        if let Some(i) = self.notes.iter().position(|n| n.path == path) {
            return Some(ItemRef::Note(NoteId(i)));
        }
        self.notebooks
            .iter()
            .position(|nb| nb.path == path)
            .map(|i| ItemRef::Notebook(NotebookId(i)))
    }

    /// Resolves `"note"`, `"notebook"` or `"notebook/note"`. Root notes win
    /// over notebooks with the same name.
    pub fn lookup(&self, name: &str) -> Option<ItemRef> {
        match name.split_once('/') {
            Some((notebook, note)) => {
                let nb = self.notebooks.iter().position(|nb| nb.name == notebook)?;
                self.notebooks[nb]
                    .notes
                    .iter()
                    .find(|id| self.notes[id.0].name == note)
                    .map(|id| ItemRef::Note(*id))
            }
            None => self
                .root_notes
                .iter()
                .find(|id| self.notes[id.0].name == name)
                .map(|id| ItemRef::Note(*id))
                .or_else(|| {
                    self.notebooks
                        .iter()
                        .position(|nb| nb.name == name)
                        .map(|i| ItemRef::Notebook(NotebookId(i)))
                }),
        }
    }

    // ------------------------------------------------------------------
    // Filesystem operations. Each one ends with a full refresh.
    // ------------------------------------------------------------------

    pub fn read_note(&mut self, id: NoteId) -> Result<String> {
        let path = self.existing_path(ItemRef::Note(id))?;
        fs::read_to_string(&path).map_err(|e| QuarkError::io(&path, e))
    }

    pub fn create_note(&mut self, name: &str, notebook: Option<NotebookId>) -> Result<NoteId> {
        let name = validate_name(name)?;
        let dir = match notebook {
            Some(id) => self.existing_path(ItemRef::Notebook(id))?,
            None => self.root.clone(),
        };
        let path = dir.join(name);

        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => QuarkError::AlreadyExists(path.clone()),
                _ => QuarkError::io(&path, e),
            })?;

        self.refresh()?;
        match self.find_by_path(&path) {
            Some(ItemRef::Note(id)) => Ok(id),
            _ => Err(QuarkError::Vanished(path)),
        }
    }

    /// Notebooks can only live directly under the root.
    pub fn create_notebook(&mut self, name: &str) -> Result<NotebookId> {
        let name = validate_name(name)?;
        let path = self.root.join(name);

        fs::create_dir(&path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => QuarkError::AlreadyExists(path.clone()),
            _ => QuarkError::io(&path, e),
        })?;

        self.refresh()?;
        match self.find_by_path(&path) {
            Some(ItemRef::Notebook(id)) => Ok(id),
            _ => Err(QuarkError::Vanished(path)),
        }
    }

    /// Renames in place (same parent directory). Returns the item's new position.
    pub fn rename(&mut self, item: ItemRef, new_name: &str) -> Result<ItemRef> {
        let new_name = validate_name(new_name)?;
        let old_path = self.existing_path(item)?;
        let new_path = old_path
            .parent()
            .map(|p| p.join(new_name))
            .ok_or_else(|| QuarkError::InvalidName(new_name.to_string()))?;

        if new_path == old_path {
            return Ok(item);
        }
        if new_path.exists() {
            return Err(QuarkError::AlreadyExists(new_path));
        }

        fs::rename(&old_path, &new_path).map_err(|e| QuarkError::io(&old_path, e))?;
        self.refresh()?;
        self.find_by_path(&new_path).ok_or(QuarkError::Vanished(new_path))
    }

    /// Deletes a note, or a notebook together with its notes.
    pub fn delete(&mut self, item: ItemRef) -> Result<()> {
        let path = self.existing_path(item)?;
        let removed = match item {
            ItemRef::Note(_) => fs::remove_file(&path),
            ItemRef::Notebook(_) => fs::remove_dir_all(&path),
        };
        removed.map_err(|e| QuarkError::io(&path, e))?;
        self.refresh()
    }

    /// Path of `item`, re-checked against the filesystem. A vanished item
    /// triggers a refresh so the listing catches up.
    fn existing_path(&mut self, item: ItemRef) -> Result<PathBuf> {
        let path = self
            .path(item)
            .map(Path::to_path_buf)
            .ok_or_else(|| QuarkError::NotFound(format!("{item:?}")))?;

        let still_there = match item {
            ItemRef::Note(_) => path.is_file(),
            ItemRef::Notebook(_) => path.is_dir(),
        };
        if still_there {
            return Ok(path);
        }

        log::info!("{} vanished, refreshing", path.display());
        self.refresh()?;
        Err(QuarkError::Vanished(path))
    }
}

fn visible_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| QuarkError::io(dir, e))?;
    Ok(keep_visible(dir, entries.map(|entry| entry.map(|e| e.path()))))
}

/// Drops hidden files. Entries that could not be read are logged and skipped.
fn keep_visible(dir: &Path, entries: impl IntoIterator<Item = io::Result<PathBuf>>) -> Vec<PathBuf> {
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping unreadable entry in {}: {e}", dir.display());
                None
            }
        })
        .filter(|path| {
            !path.file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
        })
        .collect()
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
    {
        return Err(QuarkError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn never_prompted(_: &Path) -> bool {
        panic!("directory exists, prompt must not run")
    }

    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# Readme").unwrap();
        fs::write(dir.path().join("todo.txt"), "milk").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();
        fs::create_dir(dir.path().join("work")).unwrap();
        fs::write(dir.path().join("work").join("plan.md"), "plan").unwrap();
        fs::create_dir(dir.path().join("work").join("nested")).unwrap();
        fs::write(dir.path().join("work").join("nested").join("deep.md"), "").unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        dir
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let manager = NoteManager::open(dir.path(), never_prompted).unwrap();
        assert_eq!(manager.notes().len(), 0);
        assert_eq!(manager.notebooks().len(), 0);
        assert_eq!(manager.row_count(None), 0);
        assert_eq!(manager.item_at(0, None), None);
    }

    #[test]
    fn test_scan_builds_two_levels() {
        let dir = sample_tree();
        let manager = NoteManager::open(dir.path(), never_prompted).unwrap();

        assert_eq!(manager.notes().len(), 3);
        assert_eq!(manager.notebooks().len(), 2);
        assert_eq!(manager.row_count(None), 4);

        // notes first, then notebooks
        for row in 0..2 {
            assert!(matches!(manager.item_at(row, None), Some(ItemRef::Note(_))));
        }
        for row in 2..4 {
            assert!(matches!(manager.item_at(row, None), Some(ItemRef::Notebook(_))));
        }
        assert_eq!(manager.item_at(4, None), None);

        let work = manager.lookup("work").unwrap();
        assert_eq!(manager.row_count(Some(work)), 1);
        let plan = manager.item_at(0, Some(work)).unwrap();
        assert_eq!(manager.name(plan), Some("plan.md"));
        assert_eq!(manager.parent_of(plan), Some(work));
        assert_eq!(manager.item_at(1, Some(work)), None);
        assert_eq!(manager.item_at(0, Some(plan)), None);
        assert_eq!(manager.row_count(Some(plan)), 0);

        // nested directories are not part of the tree
        assert!(manager.notes().iter().all(|n| n.name != "deep.md"));
        assert!(manager.notes().iter().all(|n| n.name != ".hidden"));
    }

    #[test]
    fn test_row_of_matches_item_at() {
        let dir = sample_tree();
        let manager = NoteManager::open(dir.path(), never_prompted).unwrap();
        for row in 0..manager.row_count(None) {
            let item = manager.item_at(row, None).unwrap();
            assert_eq!(manager.row_of(item), Some(row));
            assert_eq!(manager.parent_of(item), None);
        }
    }

    #[test]
    fn test_icons() {
        let dir = sample_tree();
        let manager = NoteManager::open(dir.path(), never_prompted).unwrap();
        assert_eq!(manager.icon(manager.lookup("README.md").unwrap()), Some(IconHint::Markdown));
        assert_eq!(manager.icon(manager.lookup("work").unwrap()), Some(IconHint::Notebook));
        assert_eq!(manager.icon(ItemRef::Note(NoteId(99))), None);
    }

    #[test]
    fn test_missing_root_prompts() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("notes");

        let err = NoteManager::open(&root, |_| false).err().unwrap();
        assert!(matches!(err, QuarkError::NotesDirDeclined(_)));
        assert!(!root.exists());

        let manager = NoteManager::open(&root, |p| p.ends_with("notes")).unwrap();
        assert!(root.is_dir());
        assert_eq!(manager.row_count(None), 0);
    }

    #[test]
    fn test_refresh_notifies_subscribers() {
        let dir = TempDir::new().unwrap();
        let mut manager = NoteManager::open(dir.path(), never_prompted).unwrap();
        let events = manager.subscribe();

        fs::write(dir.path().join("new.md"), "").unwrap();
        manager.refresh().unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            ManagerEvent::Reset { generation: 2, notes: 1, notebooks: 0 }
        );

        drop(events);
        manager.refresh().unwrap();
        assert!(manager.subscribers.is_empty());
    }

    #[test]
    fn test_create_note_and_notebook() {
        let dir = TempDir::new().unwrap();
        let mut manager = NoteManager::open(dir.path(), never_prompted).unwrap();

        let nb = manager.create_notebook("ideas").unwrap();
        let note = manager.create_note("first.md", Some(nb)).unwrap();
        assert!(dir.path().join("ideas").join("first.md").is_file());
        assert_eq!(manager.note(note).unwrap().notebook, Some(nb));

        let err = manager.create_note("first.md", Some(nb)).unwrap_err();
        assert!(matches!(err, QuarkError::AlreadyExists(_)));

        let err = manager.create_notebook("a/b").unwrap_err();
        assert!(matches!(err, QuarkError::InvalidName(_)));
    }

    #[test]
    fn test_rename_and_delete() {
        let dir = sample_tree();
        let mut manager = NoteManager::open(dir.path(), never_prompted).unwrap();

        let readme = manager.lookup("README.md").unwrap();
        let renamed = manager.rename(readme, "INTRO.md").unwrap();
        assert_eq!(manager.name(renamed), Some("INTRO.md"));
        assert!(dir.path().join("INTRO.md").is_file());
        assert!(manager.lookup("README.md").is_none());

        let todo = manager.lookup("todo.txt").unwrap();
        let err = manager.rename(todo, "INTRO.md").unwrap_err();
        assert!(matches!(err, QuarkError::AlreadyExists(_)));

        let work = manager.lookup("work").unwrap();
        manager.delete(work).unwrap();
        assert!(!dir.path().join("work").exists());
        assert!(manager.lookup("work/plan.md").is_none());
        assert_eq!(manager.notebooks().len(), 1);
    }

    #[test]
    fn test_vanished_item_refreshes_instead_of_failing_hard() {
        let dir = sample_tree();
        let mut manager = NoteManager::open(dir.path(), never_prompted).unwrap();
        let plan = manager.lookup("work/plan.md").unwrap();
        let before = manager.generation();

        fs::remove_file(dir.path().join("work").join("plan.md")).unwrap();

        let err = manager.rename(plan, "other.md").unwrap_err();
        assert!(matches!(err, QuarkError::Vanished(_)));
        assert!(manager.generation() > before);
        assert!(manager.lookup("work/plan.md").is_none());

        let ItemRef::Note(id) = manager.lookup("todo.txt").unwrap() else {
            panic!("todo.txt should be a note");
        };
        fs::remove_file(dir.path().join("todo.txt")).unwrap();
        assert!(matches!(manager.read_note(id), Err(QuarkError::Vanished(_))));
        assert!(manager.lookup("todo.txt").is_none());
    }

    #[test]
    fn test_read_note() {
        let dir = sample_tree();
        let mut manager = NoteManager::open(dir.path(), never_prompted).unwrap();
        let ItemRef::Note(id) = manager.lookup("work/plan.md").unwrap() else {
            panic!("plan.md should be a note");
        };
        assert_eq!(manager.read_note(id).unwrap(), "plan");
    }

    #[test]
    fn test_unreadable_entries_are_skipped() {
        let dir = Path::new("/notes");
        let entries = vec![
            Ok(dir.join("a.md")),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
            Ok(dir.join(".hidden")),
            Ok(dir.join("work")),
        ];
        assert_eq!(keep_visible(dir, entries), vec![dir.join("a.md"), dir.join("work")]);
    }
}
