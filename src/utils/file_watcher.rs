use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::SystemTime;

use notify::{RecursiveMode, Watcher};

/// Reports the last modification time of a watched file, once per tick.
pub trait ModificationSource {
    fn path(&self) -> &Path;

    fn modified(&mut self) -> io::Result<SystemTime>;
}

impl<S: ModificationSource + ?Sized> ModificationSource for Box<S> {
    fn path(&self) -> &Path {
        (**self).path()
    }

    fn modified(&mut self) -> io::Result<SystemTime> {
        (**self).modified()
    }
}

/// Stats the file on every call.
pub struct PollingStat {
    path: PathBuf,
}

impl PollingStat {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ModificationSource for PollingStat {
    fn path(&self) -> &Path {
        &self.path
    }

    fn modified(&mut self) -> io::Result<SystemTime> {
        fs::metadata(&self.path)?.modified()
    }
}

// AIDEV-NOTE: Watches the parent directory so editors that save by rename keep triggering events
pub struct NotifyWatcher {
    path: PathBuf,
    _watcher: notify::RecommendedWatcher,
    receiver: mpsc::Receiver<()>,
    cached: Option<SystemTime>,
    dirty: bool,
}

impl NotifyWatcher {
    pub fn new(path: &Path) -> Result<Self, notify::Error> {
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name: OsString = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel();
        let mut watcher =
            notify::recommended_watcher(move |event: Result<notify::Event, notify::Error>| {
                if let Ok(event) = event {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|changed| changed.file_name() == Some(file_name.as_os_str()));
                    if touches_file && !event.kind.is_access() {
                        let _ = tx.send(());
                    }
                }
            })?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        Ok(Self {
            path: path.to_path_buf(),
            _watcher: watcher,
            receiver: rx,
            cached: None,
            dirty: true,
        })
    }
}

impl ModificationSource for NotifyWatcher {
    fn path(&self) -> &Path {
        &self.path
    }

    /// Only stats the file after a change event; otherwise returns the cached time.
    fn modified(&mut self) -> io::Result<SystemTime> {
        while self.receiver.try_recv().is_ok() {
            self.dirty = true;
        }

        match self.cached {
            Some(cached) if !self.dirty => Ok(cached),
            _ => {
                let modified = fs::metadata(&self.path)?.modified()?;
                self.cached = Some(modified);
                self.dirty = false;
                Ok(modified)
            }
        }
    }
}
