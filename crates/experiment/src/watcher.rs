//! Experiments directory watcher.
//!
//! Every period (or sooner, when the filesystem reports a change) the
//! directory is listed and descriptor files are emitted to the supervisor.
//! New and modified files are always emitted. Unchanged files are emitted
//! on alternating scans so that time-based `when` predicates get
//! re-evaluated without the file being touched.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::{RecursiveMode, Watcher};
use rulehunter_core::QuitSignal;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::SupervisorError;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Extensions of files treated as experiment descriptors.
pub const DESCRIPTOR_EXTS: &[&str] = &["json", "yaml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub name: String,
    pub path: PathBuf,
    pub mod_time: DateTime<Utc>,
}

impl FileEvent {
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            path: path.to_path_buf(),
            mod_time: DateTime::<Utc>::from(meta.modified()?),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Seen {
    mod_time: DateTime<Utc>,
    emit_next: bool,
}

/// Scan state for one directory.
#[derive(Debug, Default)]
pub struct DirWatcher {
    seen: HashMap<String, Seen>,
}

impl DirWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// List `dir` and return the files due to be emitted on this scan,
    /// ordered by name.
    pub fn scan(&mut self, dir: &Path) -> std::io::Result<Vec<FileEvent>> {
        let mut current = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() || !is_descriptor(&path) {
                continue;
            }
            let file = FileEvent::from_path(&path)?;
            current.insert(file.name.clone(), file);
        }

        let mut events = Vec::new();
        let mut seen = HashMap::with_capacity(current.len());
        for (name, file) in current {
            let next = match self.seen.get(&name) {
                Some(prev) if prev.mod_time == file.mod_time => {
                    if prev.emit_next {
                        events.push(file.clone());
                    }
                    Seen {
                        mod_time: file.mod_time,
                        emit_next: !prev.emit_next,
                    }
                }
                _ => {
                    events.push(file.clone());
                    Seen {
                        mod_time: file.mod_time,
                        emit_next: false,
                    }
                }
            };
            seen.insert(name, next);
        }
        self.seen = seen;
        events.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(events)
    }
}

pub fn is_descriptor(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DESCRIPTOR_EXTS.contains(&e))
        .unwrap_or(false)
}

/// Start watching `dir`. Events arrive on the returned channel until
/// `quit` is raised or the receiver is dropped.
pub fn spawn(
    dir: PathBuf,
    period: Duration,
    quit: QuitSignal,
) -> Result<(mpsc::Receiver<FileEvent>, JoinHandle<()>), SupervisorError> {
    let wake = Arc::new(Notify::new());
    let mut fs_watcher = {
        let wake = Arc::clone(&wake);
        notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) if !event.kind.is_access() => wake.notify_one(),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "filesystem watcher error"),
        })?
    };
    fs_watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!(path = %dir.display(), period_ms = period.as_millis() as u64, "watching experiments directory");

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        // Held so notifications keep arriving.
        let _fs_watcher = fs_watcher;
        let mut scanner = DirWatcher::new();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = quit.raised() => break,
                _ = ticker.tick() => {}
                _ = wake.notified() => debug!("experiments directory changed"),
            }
            let events = match scanner.scan(&dir) {
                Ok(events) => events,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "couldn't scan experiments directory");
                    continue;
                }
            };
            for event in events {
                tokio::select! {
                    _ = quit.raised() => return,
                    sent = tx.send(event) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        }
        debug!("watcher stopped");
    });
    Ok((rx, handle))
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn touch(dir: &Path, name: &str, secs_ago: u64) {
        let path = dir.join(name);
        fs::write(&path, "{}").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
            .unwrap();
    }

    fn names(events: &[FileEvent]) -> Vec<&str> {
        events.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn first_scan_emits_descriptors_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.yaml", 100);
        touch(dir.path(), "a.json", 100);
        touch(dir.path(), "notes.txt", 100);
        fs::create_dir(dir.path().join("sub.json")).unwrap();

        let events = DirWatcher::new().scan(dir.path()).unwrap();
        assert_eq!(names(&events), vec!["a.json", "b.yaml"]);
    }

    #[test]
    fn unchanged_files_flip_flop() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.json", 100);
        let mut watcher = DirWatcher::new();

        let emitted: Vec<usize> = (0..5)
            .map(|_| watcher.scan(dir.path()).unwrap().len())
            .collect();
        assert_eq!(emitted, vec![1, 0, 1, 0, 1]);
    }

    #[test]
    fn modified_and_new_files_emit_immediately() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.json", 100);
        let mut watcher = DirWatcher::new();
        watcher.scan(dir.path()).unwrap();

        touch(dir.path(), "a.json", 50);
        touch(dir.path(), "b.json", 50);
        assert_eq!(names(&watcher.scan(dir.path()).unwrap()), vec!["a.json", "b.json"]);
    }

    #[test]
    fn removed_files_are_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.json", 100);
        let mut watcher = DirWatcher::new();
        watcher.scan(dir.path()).unwrap();
        fs::remove_file(dir.path().join("a.json")).unwrap();
        assert!(watcher.scan(dir.path()).unwrap().is_empty());

        touch(dir.path(), "a.json", 100);
        assert_eq!(watcher.scan(dir.path()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn spawned_watcher_emits_and_stops_on_quit() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.json", 100);
        let quit = QuitSignal::new();
        let (mut rx, handle) =
            spawn(dir.path().to_path_buf(), Duration::from_millis(20), quit.clone()).unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.name, "a.json");

        quit.raise();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
