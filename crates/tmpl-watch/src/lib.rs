//! File-backed template sources for tmpl-core
//!
//! [`FileWatcher`] polls a file's modification time and size and signals the
//! owning template whenever either changes. [`TemplateFile`] is a ready-made
//! model member that reads its fragment from disk and watches it.

mod file;
mod poll;

pub use file::TemplateFile;
pub use poll::{DEFAULT_INTERVAL, FileWatcher};
