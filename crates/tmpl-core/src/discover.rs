//! Fragment discovery
//!
//! Walks the live value graph of a model, collecting the template source of every
//! node that provides one. Sequences, maps and present optionals are visited per
//! element under the binding name of the member holding them.

use std::convert::Infallible;

use tracing::debug;

use crate::error::CompileError;
use crate::model::{Model, Source};
use crate::schema::join_path;
use crate::watch::Watch;

/// Template source bound to one node of the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Binding name: the tag override, else the member name. The root fragment
    /// carries the entry name.
    pub name: String,
    pub text: String,
    /// Dotted member path of the node the fragment came from; empty for the root.
    pub origin: String,
}

/// Every fragment discovery found, root fragment first.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub fragments: Vec<Fragment>,
}

/// Reads the text of a source, from disk for [`Source::File`].
pub fn read_source(source: Source) -> Result<String, CompileError> {
    match source {
        Source::Text(text) => Ok(text),
        Source::File(path) => {
            std::fs::read_to_string(&path).map_err(|source| CompileError::Source { path, source })
        }
    }
}

/// Collects the fragments of `root`, which must provide a source.
pub fn discover<T: Model>(root: &T) -> Result<Discovery, CompileError> {
    let info = T::type_info();
    let source = root.source().ok_or_else(|| CompileError::MissingSource {
        type_name: info.name().to_string(),
    })?;

    let mut discovery = Discovery::default();
    discovery.push(Fragment {
        name: info.name().to_string(),
        text: read_source(source)?,
        origin: String::new(),
    })?;

    for field in root.fields() {
        let name = field.binding_name();
        walk(field.value, name, name, &mut |value, name, path| {
            if let Some(source) = value.source() {
                discovery.push(Fragment {
                    name: name.to_string(),
                    text: read_source(source)?,
                    origin: path.to_string(),
                })?;
            }
            Ok::<(), CompileError>(())
        })?;
    }
    Ok(discovery)
}

/// Watchers of `root` and every source-providing node below it, without reading
/// any source.
pub fn watchers(root: &dyn Model) -> Vec<&dyn Watch> {
    let mut found: Vec<&dyn Watch> = root.watcher().into_iter().collect();
    for field in root.fields() {
        let name = field.binding_name();
        let walked = walk(field.value, name, name, &mut |value, _, _| {
            if value.source().is_some() {
                found.extend(value.watcher());
            }
            Ok::<(), Infallible>(())
        });
        if let Err(never) = walked {
            match never {}
        }
    }
    found
}

impl Discovery {
    fn push(&mut self, fragment: Fragment) -> Result<(), CompileError> {
        if let Some(existing) = self.fragments.iter().find(|f| f.name == fragment.name) {
            if existing.text == fragment.text {
                return Ok(());
            }
            return Err(CompileError::Duplicate {
                name: fragment.name,
            });
        }
        debug!(
            name = %fragment.name,
            origin = %fragment.origin,
            bytes = fragment.text.len(),
            "discovered fragment"
        );
        self.fragments.push(fragment);
        Ok(())
    }
}

/// Visits every node of the live value graph below `value`, elements under the
/// name of their container.
fn walk<'m, E>(
    value: &'m dyn Model,
    name: &'static str,
    path: &str,
    visit: &mut dyn FnMut(&'m dyn Model, &'static str, &str) -> Result<(), E>,
) -> Result<(), E> {
    let elements = value.elements();
    if !elements.is_empty() {
        for element in elements {
            walk(element, name, path, visit)?;
        }
        return Ok(());
    }

    visit(value, name, path)?;
    for field in value.fields() {
        let child = join_path(path, field.binding_name());
        walk(field.value, field.binding_name(), &child, visit)?;
    }
    Ok(())
}
