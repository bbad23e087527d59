//! Render surface
//!
//! [`Template`] owns the root model and the published [`CompiledProgram`]. Renders
//! clone the current snapshot under a read lock and execute outside of it;
//! recompilation builds a new program without holding the lock and only swaps the
//! snapshot under the write lock, so a failed pass never publishes anything.

use std::io::Write;
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::compile::Compiler;
use crate::config::Options;
use crate::discover;
use crate::error::CompileError;
use crate::model::Model;
use crate::program::CompiledProgram;
use crate::template::{FuncMap, RenderError};
use crate::watch::Signal;

/// Per-call render settings.
#[derive(Debug, Clone)]
pub enum RenderOption {
    /// Also register the entry tree under this name, typically
    /// [`OUTLET`](crate::config::consts::OUTLET).
    Name(String),
    /// Render this tree instead of the entry. Repeated targets render in order
    /// into one output.
    Target(String),
    /// Extra functions for this call.
    Funcs(FuncMap),
}

struct Shared<T> {
    root: T,
    compiler: Compiler,
    snapshot: RwLock<Arc<CompiledProgram>>,
}

impl<T: Model> Shared<T> {
    fn snapshot(&self) -> Arc<CompiledProgram> {
        let guard = self.snapshot.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    fn recompile(&self) -> Result<(), CompileError> {
        let program = self.compiler.compile(&self.root)?;
        let mut guard = self.snapshot.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(program);
        info!(entry = guard.entry(), "published recompiled template");
        Ok(())
    }
}

/// A compiled root model, ready to render.
pub struct Template<T: Model + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Model + 'static> Clone for Template<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Model + 'static> Template<T> {
    /// Compiles `root` with the default analyzers.
    pub fn new(root: T, options: Options) -> Result<Self, CompileError> {
        Self::with_compiler(root, Compiler::new(options))
    }

    /// Compiles `root` and starts its watchers, if it has any.
    pub fn with_compiler(root: T, compiler: Compiler) -> Result<Self, CompileError> {
        let program = compiler.compile(&root)?;
        let shared = Arc::new(Shared {
            root,
            compiler,
            snapshot: RwLock::new(Arc::new(program)),
        });
        start_watchers(&shared);
        Ok(Self { shared })
    }

    pub fn root(&self) -> &T {
        &self.shared.root
    }

    /// The currently published program.
    pub fn snapshot(&self) -> Arc<CompiledProgram> {
        self.shared.snapshot()
    }

    /// Reruns the whole pipeline; the previous program stays in effect on failure.
    pub fn recompile(&self) -> Result<(), CompileError> {
        self.shared.recompile()
    }

    pub fn render_to_string(
        &self,
        data: &dyn Model,
        options: &[RenderOption],
    ) -> Result<String, RenderError> {
        let mut program = (*self.snapshot()).clone();
        let mut targets = Vec::new();
        for option in options {
            match option {
                RenderOption::Name(alias) => program.alias(alias),
                RenderOption::Target(target) => targets.push(target.as_str()),
                RenderOption::Funcs(funcs) => program.extend_funcs(funcs.clone()),
            }
        }

        let value = data.to_value();
        let mut out = String::new();
        if targets.is_empty() {
            program.execute(None, &value, &mut out)?;
        }
        for target in targets {
            program.execute(Some(target), &value, &mut out)?;
        }
        Ok(out)
    }

    /// Renders into `sink`. Nothing is written if execution fails.
    pub fn render<W: Write>(
        &self,
        sink: &mut W,
        data: &dyn Model,
        options: &[RenderOption],
    ) -> Result<(), RenderError> {
        let out = self.render_to_string(data, options)?;
        sink.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Renders and sends the output as one message.
    pub fn render_to_channel(
        &self,
        tx: &Sender<String>,
        data: &dyn Model,
        options: &[RenderOption],
    ) -> Result<(), RenderError> {
        let out = self.render_to_string(data, options)?;
        tx.send(out).map_err(|_| RenderError::ChannelClosed)
    }
}

/// How often an idle recompile thread checks whether its template is gone.
const IDLE_CHECK: Duration = Duration::from_millis(50);

/// Spawns every watcher of the model and a thread that recompiles on their
/// signals. The thread holds the template weakly; once the template is dropped
/// it exits and its listener closes the watchers' signals.
fn start_watchers<T: Model + 'static>(shared: &Arc<Shared<T>>) {
    let watchers = discover::watchers(&shared.root);
    if watchers.is_empty() {
        return;
    }

    let (signal, listener) = Signal::channel();
    for watcher in &watchers {
        watcher.spawn(signal.clone());
    }
    drop(signal);
    debug!(watchers = watchers.len(), "started template watchers");

    let weak: Weak<Shared<T>> = Arc::downgrade(shared);
    let spawned = thread::Builder::new()
        .name("tmpl-recompile".to_string())
        .spawn(move || {
            loop {
                match listener.recv_timeout(IDLE_CHECK) {
                    Ok(()) => {
                        // one pass per burst of signals
                        while listener.try_recv().is_ok() {}
                        let Some(shared) = weak.upgrade() else {
                            break;
                        };
                        if let Err(err) = shared.recompile() {
                            warn!(error = %err, "recompilation failed, keeping the previous template");
                        }
                    }
                    Err(RecvTimeoutError::Timeout) if weak.strong_count() > 0 => {}
                    Err(_) => break,
                }
            }
            debug!("template dropped, stopping recompile thread");
        });
    if let Err(err) = spawned {
        warn!(error = %err, "failed to start the recompile thread");
    }
}
