//! Timers for the live preview and the watch loop that keeps an HTML file
//! in step with a note.
//!
//! Both timers take the current `Instant` as an argument instead of reading
//! the clock, so the caller owns the event loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::Config;
use crate::error::{QuarkError, Result};
use crate::render::Renderer;

const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Single-shot timer. Triggering while pending restarts it, so a burst of
/// edits produces one fire after the last of them.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// True exactly once per trigger, once the delay has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the pending fire, if any.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}

/// Repeating timer, used for autosave.
#[derive(Debug, Clone)]
pub struct Interval {
    period: Duration,
    next: Instant,
}

impl Interval {
    pub fn new(period: Duration, now: Instant) -> Self {
        Self { period, next: now + period }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        // Skip ticks that were missed instead of firing them all at once.
        while self.next <= now {
            self.next += self.period.max(Duration::from_millis(1));
        }
        true
    }
}

/// Re-renders a note to an HTML file whenever the note changes on disk.
///
/// The note's directory is watched rather than the file itself, so editors
/// that save by writing a new file and renaming it over the old one keep
/// being followed.
pub struct NoteWatcher<'a> {
    note: PathBuf,
    out: PathBuf,
    renderer: &'a Renderer,
    debounce: Debounce,
    rx: Receiver<notify::Result<Event>>,
    _watcher: Option<RecommendedWatcher>,
}

impl<'a> NoteWatcher<'a> {
    pub fn new(note: &Path, out: &Path, renderer: &'a Renderer, delay: Duration) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        let dir = match note.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        let mut note_watcher = Self::from_events(note, out, renderer, delay, rx);
        note_watcher._watcher = Some(watcher);
        Ok(note_watcher)
    }

    /// A watcher fed from `rx` instead of the filesystem.
    pub fn from_events(
        note: &Path,
        out: &Path,
        renderer: &'a Renderer,
        delay: Duration,
        rx: Receiver<notify::Result<Event>>,
    ) -> Self {
        Self {
            note: note.to_path_buf(),
            out: out.to_path_buf(),
            renderer,
            debounce: Debounce::new(delay),
            rx,
            _watcher: None,
        }
    }

    pub fn render_now(&self) -> Result<()> {
        let text = fs::read_to_string(&self.note).map_err(|e| QuarkError::io(&self.note, e))?;
        self.renderer.export(&text, &self.out)
    }

    /// Drains queued events, then renders if the debounce has run out.
    /// Returns true when the HTML file was written.
    pub fn check(&mut self, now: Instant) -> Result<bool> {
        while let Ok(res) = self.rx.try_recv() {
            self.handle(res, now)?;
        }
        self.fire(now)
    }

    /// Blocks until an event arrives or the pending render is due.
    pub fn wait(&mut self) -> Result<bool> {
        let timeout = self.debounce.remaining(Instant::now()).unwrap_or(IDLE_WAIT);
        match self.rx.recv_timeout(timeout) {
            Ok(res) => self.handle(res, Instant::now())?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("File watcher stopped");
                return Err(QuarkError::Vanished(self.note.clone()));
            }
        }
        self.check(Instant::now())
    }

    fn fire(&mut self, now: Instant) -> Result<bool> {
        if self.debounce.poll(now) {
            self.render_now()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn handle(&mut self, res: notify::Result<Event>, now: Instant) -> Result<()> {
        let event = match res {
            Ok(event) => event,
            Err(e) => {
                log::warn!("Watch error on {}: {e}", self.note.display());
                return Ok(());
            }
        };
        if !event.paths.iter().any(|p| p.file_name() == self.note.file_name()) {
            return Ok(());
        }

        match event.kind {
            EventKind::Access(_) => {}
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) if !self.note.is_file() => {
                return Err(QuarkError::Vanished(self.note.clone()));
            }
            _ => {
                log::debug!("{} changed", self.note.display());
                self.debounce.trigger(now);
            }
        }
        Ok(())
    }
}

/// Runs until the process is interrupted or the note goes away.
pub fn watch(note: &Path, out: &Path, renderer: &Renderer, config: &Config) -> Result<()> {
    let mut watcher = NoteWatcher::new(note, out, renderer, Duration::from_millis(config.update_delay))?;
    watcher.render_now()?;
    log::info!("Watching {} -> {}", note.display(), out.display());

    loop {
        if watcher.wait()? {
            log::info!("Updated {}", out.display());
        }
    }
}
