use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

use tmpl_core::{Signal, Watch};
use tracing::{debug, warn};

/// Polling interval used by [`FileWatcher::new`].
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Watches one file by polling its metadata.
///
/// Each spawned watch runs on its own thread and ends within one interval of its
/// signal being closed.
#[derive(Debug, Clone)]
pub struct FileWatcher {
    path: PathBuf,
    interval: Duration,
}

impl FileWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// What a poll compares; `None` while the file is missing.
type Stamp = Option<(SystemTime, u64)>;

fn stamp(path: &Path) -> Stamp {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

impl Watch for FileWatcher {
    fn spawn(&self, signal: Signal) {
        let path = self.path.clone();
        let interval = self.interval;

        let spawned = thread::Builder::new()
            .name("tmpl-watch".to_string())
            .spawn(move || {
                let mut last = stamp(&path);
                loop {
                    thread::sleep(interval);
                    if signal.is_closed() {
                        debug!(path = %path.display(), "template dropped, stopping watch");
                        break;
                    }
                    let current = stamp(&path);
                    if current == last {
                        continue;
                    }
                    last = current;
                    debug!(path = %path.display(), "template file changed");
                    if !signal.notify() {
                        break;
                    }
                }
            });

        if let Err(err) = spawned {
            warn!(path = %self.path.display(), error = %err, "failed to start file watcher");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let watcher = FileWatcher::new("a.html");
        assert_eq!(watcher.path(), Path::new("a.html"));
        assert_eq!(watcher.interval(), DEFAULT_INTERVAL);

        let fast = watcher.with_interval(Duration::from_millis(5));
        assert_eq!(fast.interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_missing_file_has_no_stamp() {
        assert!(stamp(Path::new("definitely/not/here.html")).is_none());
    }
}
