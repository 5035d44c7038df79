use std::path::Path;
use std::time::SystemTime;

use crate::utils::file_watcher::ModificationSource;
use crate::utils::validation::BuildError;

/// What a single monitor tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Unchanged,
    /// The modification time could not be read; nothing was touched.
    Unobservable,
    Reloaded,
    Failed(BuildError),
}

/// The watched file and the last modification time a rebuild was attempted for.
#[derive(Debug)]
pub struct WatchState<S> {
    source: S,
    last_modified: Option<SystemTime>,
}

impl<S: ModificationSource> WatchState<S> {
    pub fn path(&self) -> &Path {
        self.source.path()
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }
}

// AIDEV-NOTE: Stat-driven hot reload; the timestamp is recorded before the rebuild so a slow build cannot retrigger
pub struct ReloadMonitor<S> {
    watch: WatchState<S>,
}

impl<S: ModificationSource> ReloadMonitor<S> {
    /// Records the file's current modification time as already built. When it
    /// cannot be read, the first successful observation triggers a rebuild.
    pub fn new(mut source: S) -> Self {
        let last_modified = match source.modified() {
            Ok(modified) => Some(modified),
            Err(e) => {
                tracing::warn!(
                    "could not read modification time of {}: {e}",
                    source.path().display()
                );
                None
            }
        };

        Self {
            watch: WatchState {
                source,
                last_modified,
            },
        }
    }

    /// Records the modification time, then runs the initial build. A save that
    /// lands while the build runs is newer than the record and triggers the
    /// first tick.
    pub fn start<P, F>(source: S, build: F) -> (Self, Result<P, BuildError>)
    where
        F: FnOnce() -> Result<P, BuildError>,
    {
        let monitor = Self::new(source);
        let built = build();
        (monitor, built)
    }

    pub fn watch_state(&self) -> &WatchState<S> {
        &self.watch
    }

    /// Checks the watched file once and rebuilds on a strictly newer timestamp.
    ///
    /// A successful rebuild replaces `current`, dropping the old program before
    /// returning. A failed rebuild leaves `current` untouched, including `None`.
    pub fn tick<P, F>(&mut self, current: &mut Option<P>, rebuild: F) -> TickOutcome
    where
        F: FnOnce() -> Result<P, BuildError>,
    {
        let modified = match self.watch.source.modified() {
            Ok(modified) => modified,
            Err(e) => {
                tracing::debug!("skipping reload check for {}: {e}", self.path_display());
                return TickOutcome::Unobservable;
            }
        };

        if self
            .watch
            .last_modified
            .is_some_and(|last| modified <= last)
        {
            return TickOutcome::Unchanged;
        }

        self.watch.last_modified = Some(modified);
        tracing::info!("{} changed, rebuilding", self.path_display());

        match rebuild() {
            Ok(program) => {
                drop(current.replace(program));
                tracing::info!("reloaded {}", self.file_name());
                TickOutcome::Reloaded
            }
            Err(e) => {
                tracing::warn!(
                    "{}: {}; keeping the previous program",
                    self.file_name(),
                    e.summary()
                );
                TickOutcome::Failed(e)
            }
        }
    }

    fn path_display(&self) -> String {
        self.watch.path().display().to_string()
    }

    fn file_name(&self) -> String {
        self.watch
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path_display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::io;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::time::Duration;

    use crate::utils::validation::{Stage, StageDiagnostic};

    /// Modification source driven by the test; `None` simulates a failed stat.
    #[derive(Clone)]
    struct ScriptedSource {
        path: PathBuf,
        modified: Rc<RefCell<Option<SystemTime>>>,
    }

    impl ScriptedSource {
        fn new(start: Option<SystemTime>) -> Self {
            Self {
                path: PathBuf::from("shaders/main.frag"),
                modified: Rc::new(RefCell::new(start)),
            }
        }

        fn set(&self, modified: Option<SystemTime>) {
            *self.modified.borrow_mut() = modified;
        }
    }

    impl ModificationSource for ScriptedSource {
        fn path(&self) -> &Path {
            &self.path
        }

        fn modified(&mut self) -> io::Result<SystemTime> {
            self.modified
                .borrow()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file is being replaced"))
        }
    }

    fn epoch(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn compile_failure() -> BuildError {
        BuildError::CompileFailed {
            failures: vec![StageDiagnostic {
                stage: Stage::Fragment,
                path: PathBuf::from("shaders/main.frag"),
                log: "error: expected '}'".to_string(),
            }],
        }
    }

    #[test]
    fn test_unchanged_mtime_never_rebuilds() {
        let source = ScriptedSource::new(Some(epoch(100)));
        let mut monitor = ReloadMonitor::new(source);
        let mut program = Some(1u32);
        let builds = Cell::new(0);

        for _ in 0..50 {
            let outcome = monitor.tick(&mut program, || {
                builds.set(builds.get() + 1);
                Ok(2)
            });
            assert!(matches!(outcome, TickOutcome::Unchanged));
        }

        assert_eq!(builds.get(), 0);
        assert_eq!(program, Some(1));
    }

    #[test]
    fn test_one_change_triggers_exactly_one_rebuild() {
        let source = ScriptedSource::new(Some(epoch(100)));
        let mut monitor = ReloadMonitor::new(source.clone());
        let mut program = Some(1u32);
        let builds = Cell::new(0);

        source.set(Some(epoch(101)));
        for _ in 0..10 {
            monitor.tick(&mut program, || {
                builds.set(builds.get() + 1);
                Ok(2)
            });
        }

        assert_eq!(builds.get(), 1);
        assert_eq!(program, Some(2));
        assert_eq!(monitor.watch_state().last_modified(), Some(epoch(101)));
    }

    #[test]
    fn test_older_mtime_is_ignored() {
        let source = ScriptedSource::new(Some(epoch(100)));
        let mut monitor = ReloadMonitor::new(source.clone());
        let mut program = Some(1u32);

        source.set(Some(epoch(90)));
        let outcome = monitor.tick(&mut program, || Ok(2));

        assert!(matches!(outcome, TickOutcome::Unchanged));
        assert_eq!(program, Some(1));
    }

    #[test]
    fn test_failed_stat_leaves_state_untouched() {
        let source = ScriptedSource::new(Some(epoch(100)));
        let mut monitor = ReloadMonitor::new(source.clone());
        let mut program = Some(1u32);

        source.set(None);
        let outcome = monitor.tick(&mut program, || -> Result<u32, BuildError> {
            panic!("no rebuild while the file is unobservable")
        });

        assert!(matches!(outcome, TickOutcome::Unobservable));
        assert_eq!(program, Some(1));
        assert_eq!(monitor.watch_state().last_modified(), Some(epoch(100)));
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_program() {
        let source = ScriptedSource::new(Some(epoch(100)));
        let mut monitor = ReloadMonitor::new(source.clone());
        let mut program = Some(1u32);

        source.set(Some(epoch(101)));
        let outcome = monitor.tick(&mut program, || Err(compile_failure()));

        match outcome {
            TickOutcome::Failed(BuildError::CompileFailed { failures }) => {
                assert_eq!(failures[0].stage, Stage::Fragment);
            }
            other => panic!("expected compile failure, got {other:?}"),
        }
        assert_eq!(program, Some(1));

        // No retry until the file changes again.
        let outcome = monitor.tick(&mut program, || Ok(3));
        assert!(matches!(outcome, TickOutcome::Unchanged));
        assert_eq!(program, Some(1));

        source.set(Some(epoch(102)));
        monitor.tick(&mut program, || Ok(3));
        assert_eq!(program, Some(3));
    }

    #[test]
    fn test_failed_rebuild_keeps_empty_program() {
        let source = ScriptedSource::new(Some(epoch(100)));
        let mut monitor = ReloadMonitor::new(source.clone());
        let mut program: Option<u32> = None;

        source.set(Some(epoch(101)));
        monitor.tick(&mut program, || Err(compile_failure()));

        assert_eq!(program, None);
    }

    #[test]
    fn test_unreadable_at_start_rebuilds_once_visible() {
        let source = ScriptedSource::new(None);
        let mut monitor = ReloadMonitor::new(source.clone());
        let mut program: Option<u32> = None;

        assert!(matches!(
            monitor.tick(&mut program, || Ok(1)),
            TickOutcome::Unobservable
        ));

        source.set(Some(epoch(5)));
        assert!(matches!(
            monitor.tick(&mut program, || Ok(1)),
            TickOutcome::Reloaded
        ));
        assert_eq!(program, Some(1));
    }

    #[test]
    fn test_old_program_dropped_before_tick_returns() {
        struct Tracked(Rc<Cell<u32>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let source = ScriptedSource::new(Some(epoch(100)));
        let mut monitor = ReloadMonitor::new(source.clone());
        let mut program = Some(Tracked(drops.clone()));

        source.set(Some(epoch(101)));
        monitor.tick(&mut program, || Ok(Tracked(drops.clone())));

        assert_eq!(drops.get(), 1);
        assert!(program.is_some());
    }

    #[test]
    fn test_save_during_initial_build_triggers_first_tick() {
        let source = ScriptedSource::new(Some(epoch(100)));
        let handle = source.clone();

        let (mut monitor, initial) = ReloadMonitor::start(source, || {
            handle.set(Some(epoch(101)));
            Ok(1u32)
        });
        assert_eq!(monitor.watch_state().last_modified(), Some(epoch(100)));

        let mut program = initial.ok();
        let outcome = monitor.tick(&mut program, || Ok(2));
        assert!(matches!(outcome, TickOutcome::Reloaded));
        assert_eq!(program, Some(2));
    }
}
