//! Parse forest
//!
//! Every fragment of a compilation is parsed into the same forest. The root
//! fragment names the entry tree; any other fragment becomes a tree addressable by
//! its binding name, exactly as if it had been written inside `define`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::Delimiters;
use crate::error::CompileError;
use crate::template::{self, Tree};

#[derive(Debug, Clone)]
pub struct ParseForest {
    entry: String,
    trees: BTreeMap<String, Arc<Tree>>,
    delimiters: Delimiters,
    next_id: u32,
}

impl ParseForest {
    pub fn new(delimiters: Delimiters) -> Self {
        Self {
            entry: String::new(),
            trees: BTreeMap::new(),
            delimiters,
            next_id: 0,
        }
    }

    /// Parses one fragment into the forest.
    ///
    /// `define`/`block` trees inside the fragment join the forest as well. A tree
    /// whose name is already taken replaces the existing one only if that one is
    /// empty; an empty tree never replaces anything; two non-empty trees under one
    /// name are a [`CompileError::Duplicate`].
    pub fn parse(&mut self, name: &str, text: &str, is_root: bool) -> Result<(), CompileError> {
        let parsed = template::parse(
            name,
            text,
            self.delimiters.left(),
            self.delimiters.right(),
            self.next_id,
        )?;
        self.next_id = parsed.next_id;

        if is_root {
            self.entry = name.to_string();
        }
        for tree in parsed.trees {
            debug!(template = %tree.name, fragment = name, "parsed tree");
            self.insert(tree)?;
        }
        Ok(())
    }

    fn insert(&mut self, tree: Tree) -> Result<(), CompileError> {
        match self.trees.get(&tree.name) {
            Some(_) if tree.is_empty() => Ok(()),
            Some(existing) if !existing.is_empty() => Err(CompileError::Duplicate {
                name: tree.name.clone(),
            }),
            _ => {
                self.trees.insert(tree.name.clone(), Arc::new(tree));
                Ok(())
            }
        }
    }

    /// Name of the entry tree; empty until the root fragment is parsed.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn entry_tree(&self) -> Option<&Arc<Tree>> {
        self.trees.get(&self.entry)
    }

    pub fn tree(&self, name: &str) -> Option<&Arc<Tree>> {
        self.trees.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }

    pub fn trees(&self) -> &BTreeMap<String, Arc<Tree>> {
        &self.trees
    }

    pub(crate) fn into_parts(self) -> (String, BTreeMap<String, Arc<Tree>>) {
        (self.entry, self.trees)
    }
}
