use std::path::{Path, PathBuf};
use std::time::Duration;

use tmpl_core::{Model, Signal, Source, TemplateProvider, Watch};

use crate::poll::FileWatcher;

/// A fragment read from a file on every compilation and recompiled when the
/// file changes.
///
/// Used as a member of a model; the member's binding name becomes the
/// fragment name:
///
/// ```ignore
/// #[derive(Model)]
/// #[tmpl(text = "<main>{{template \"body\" .}}</main>")]
/// struct Layout {
///     #[tmpl(name = "body")]
///     body: TemplateFile,
/// }
/// ```
#[derive(Model, Debug, Clone)]
#[tmpl(provider, watch)]
pub struct TemplateFile {
    #[tmpl(skip)]
    watcher: FileWatcher,
}

impl TemplateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            watcher: FileWatcher::new(path),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.watcher = self.watcher.with_interval(interval);
        self
    }

    pub fn path(&self) -> &Path {
        self.watcher.path()
    }
}

impl TemplateProvider for TemplateFile {
    fn template_source(&self) -> Source {
        Source::File(self.watcher.path().to_path_buf())
    }
}

impl Watch for TemplateFile {
    fn spawn(&self, signal: Signal) {
        self.watcher.spawn(signal);
    }
}
