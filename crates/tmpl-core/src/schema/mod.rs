//! Schema tree builder
//!
//! Introspects a model into an arena of addressable nodes. Embedded members are
//! promoted into their parent, map values hang under a `*` element node, and a type
//! that already appears among a node's ancestors is linked to that ancestor instead
//! of being expanded again, so the tree stays finite over recursive shapes.

use std::collections::HashSet;

use tracing::debug;

use crate::error::CompileError;
use crate::model::{Kind, Model, TypeInfo, Value};

/// Name of the element node under a map.
pub const MAP_ELEMENT: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaNodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    kind: Kind,
    type_name: &'static str,
    type_path: &'static str,
    dynamic_kind: Option<Kind>,
    parent: Option<SchemaNodeId>,
    children: Vec<SchemaNodeId>,
    link: Option<SchemaNodeId>,
    open: bool,
}

/// The addressable shape of one model, rebuilt on every compilation.
#[derive(Debug, Clone)]
pub struct SchemaTree {
    nodes: Vec<NodeData>,
}

impl SchemaTree {
    pub fn build<T: Model>(root: &T) -> Result<Self, CompileError> {
        Self::from_parts(&T::type_info(), &root.to_value())
    }

    /// Builds from a static description plus the live value, which is only read
    /// where the static shape is dynamic.
    pub fn from_parts(info: &TypeInfo, value: &Value) -> Result<Self, CompileError> {
        let mut builder = Builder { nodes: Vec::new() };
        let root = builder.push(info.name(), info, None);
        builder.populate(root, info, Some(value))?;

        debug!(
            type_name = info.name(),
            nodes = builder.nodes.len(),
            "built schema tree"
        );
        Ok(Self {
            nodes: builder.nodes,
        })
    }

    pub fn root(&self) -> SchemaNode<'_> {
        self.node(SchemaNodeId(0))
    }

    pub fn node(&self, id: SchemaNodeId) -> SchemaNode<'_> {
        SchemaNode { tree: self, id }
    }

    /// Number of materialised nodes; linked nodes count once.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves a dotted path such as `.Items.Name`. The empty path is the root.
    pub fn find(&self, path: &str) -> Option<SchemaNode<'_>> {
        let segments = split_path(path);
        self.find_path(&segments)
    }

    /// Child-name lookup at each segment. A missing segment under a map selects the
    /// element node; under an unresolved dynamic node it is absorbed, and the
    /// dynamic node is returned.
    pub fn find_path(&self, segments: &[&str]) -> Option<SchemaNode<'_>> {
        let mut node = self.root();
        for segment in segments {
            if let Some(child) = node.child(segment) {
                node = child;
                continue;
            }
            if node.kind() == Kind::Map {
                node = node.child(MAP_ELEMENT)?;
                continue;
            }
            if node.is_open() {
                continue;
            }
            return None;
        }
        Some(node)
    }

    fn data(&self, id: SchemaNodeId) -> &NodeData {
        &self.nodes[id.0]
    }
}

/// Splits `.A.B` or `A.B` into segments; empty input yields no segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.trim_start_matches('.')
        .split('.')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Joins a path prefix and a relative path with `.`.
pub fn join_path(prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches('.');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}.{}", prefix, path),
    }
}

/// Borrowed view of one schema node.
#[derive(Clone, Copy)]
pub struct SchemaNode<'t> {
    tree: &'t SchemaTree,
    id: SchemaNodeId,
}

impl<'t> SchemaNode<'t> {
    pub fn id(&self) -> SchemaNodeId {
        self.id
    }

    pub fn name(&self) -> &'t str {
        &self.tree.data(self.id).name
    }

    /// Declared kind.
    pub fn kind(&self) -> Kind {
        self.tree.data(self.id).kind
    }

    /// Runtime kind of a dynamic node, when the live value revealed it.
    pub fn dynamic_kind(&self) -> Option<Kind> {
        self.tree.data(self.id).dynamic_kind
    }

    /// Dynamic kind if known, declared kind otherwise. `None` for a dynamic node
    /// whose runtime kind is unknown.
    pub fn effective_kind(&self) -> Option<Kind> {
        match self.kind() {
            Kind::Dynamic => self.dynamic_kind(),
            kind => Some(kind),
        }
    }

    /// Type the node's members come from; the element type for sequences and
    /// optionals.
    pub fn type_name(&self) -> &'static str {
        self.tree.data(self.id).type_name
    }

    /// Whether paths below this node cannot be checked statically.
    pub fn is_open(&self) -> bool {
        self.tree.data(self.id).open
    }

    /// The ancestor whose children this node reuses, if it closes a cycle.
    pub fn link(&self) -> Option<SchemaNode<'t>> {
        self.tree.data(self.id).link.map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = SchemaNode<'t>> + use<'t> {
        let tree = self.tree;
        let source = self.tree.data(self.id).link.unwrap_or(self.id);
        tree.data(source)
            .children
            .iter()
            .map(move |id| tree.node(*id))
    }

    pub fn child(&self, name: &str) -> Option<SchemaNode<'t>> {
        self.children().find(|c| c.name() == name)
    }
}

impl std::fmt::Debug for SchemaNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaNode")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("type_name", &self.type_name())
            .finish()
    }
}

struct Builder {
    nodes: Vec<NodeData>,
}

impl Builder {
    fn push(&mut self, name: &str, info: &TypeInfo, parent: Option<SchemaNodeId>) -> SchemaNodeId {
        let id = SchemaNodeId(self.nodes.len());
        self.nodes.push(NodeData {
            name: name.to_string(),
            kind: info.kind(),
            type_name: info.name(),
            type_path: info.path(),
            dynamic_kind: None,
            parent,
            children: Vec::new(),
            link: None,
            open: false,
        });
        id
    }

    fn populate(
        &mut self,
        id: SchemaNodeId,
        info: &TypeInfo,
        value: Option<&Value>,
    ) -> Result<(), CompileError> {
        let mut embedded = Vec::new();

        match info.kind() {
            Kind::Struct => {
                let object = value.and_then(Value::as_object);
                for member in info.members() {
                    let name = member.binding_name();
                    self.ensure_unique(id, name, info)?;
                    let child_value = object.and_then(|o| o.get(name));
                    let child = self.build_child(id, name, &member.type_info(), child_value)?;
                    if member.is_embedded() {
                        embedded.push(child);
                    }
                }
            }
            Kind::Sequence => {
                if let Some(element) = info.element() {
                    self.nodes[id.0].type_name = element.name();
                    self.populate(id, &element, None)?;
                }
            }
            Kind::Optional => {
                // to_value flattens a present optional to its pointee.
                if let Some(element) = info.element() {
                    self.nodes[id.0].type_name = element.name();
                    self.populate(id, &element, value)?;
                }
            }
            Kind::Map => {
                if let Some(element) = info.element() {
                    self.build_child(id, MAP_ELEMENT, &element, None)?;
                }
            }
            Kind::Dynamic => match value {
                Some(Value::Object(object)) => {
                    self.nodes[id.0].dynamic_kind = Some(Kind::Struct);
                    let dynamic = object.type_info();
                    self.populate(id, &dynamic, value)?;
                }
                Some(Value::Nil) | None => self.nodes[id.0].open = true,
                Some(other) => {
                    let kind = other.kind();
                    self.nodes[id.0].dynamic_kind = Some(kind);
                    self.nodes[id.0].open = matches!(kind, Kind::Map | Kind::Sequence);
                }
            },
            _ => {}
        }

        for accessor in info.accessors() {
            self.ensure_unique(id, accessor.name(), info)?;
            self.build_child(id, accessor.name(), &accessor.returns(), None)?;
        }

        self.promote(id, &embedded);
        Ok(())
    }

    fn build_child(
        &mut self,
        parent: SchemaNodeId,
        name: &str,
        info: &TypeInfo,
        value: Option<&Value>,
    ) -> Result<SchemaNodeId, CompileError> {
        let child = self.push(name, info, Some(parent));
        self.nodes[parent.0].children.push(child);

        if let Some(ancestor) = self.ancestor_of_type(parent, info) {
            self.nodes[child.0].link = Some(ancestor);
            return Ok(child);
        }
        self.populate(child, info, value)?;
        Ok(child)
    }

    /// Nearest ancestor (starting at `from`) built from the same non-scalar type.
    fn ancestor_of_type(&self, from: SchemaNodeId, info: &TypeInfo) -> Option<SchemaNodeId> {
        if info.kind().is_scalar() || matches!(info.kind(), Kind::Dynamic | Kind::Unit) {
            return None;
        }
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let data = &self.nodes[id.0];
            if data.type_path == info.path() && data.link.is_none() {
                return Some(id);
            }
            cursor = data.parent;
        }
        None
    }

    fn ensure_unique(
        &self,
        id: SchemaNodeId,
        name: &str,
        info: &TypeInfo,
    ) -> Result<(), CompileError> {
        let taken = self.nodes[id.0]
            .children
            .iter()
            .any(|c| self.nodes[c.0].name == name);
        if taken {
            return Err(CompileError::Schema {
                type_name: info.name().to_string(),
                reason: format!("member name '{}' is declared more than once", name),
            });
        }
        Ok(())
    }

    fn effective_children(&self, id: SchemaNodeId) -> Vec<SchemaNodeId> {
        let source = self.nodes[id.0].link.unwrap_or(id);
        self.nodes[source.0].children.clone()
    }

    /// Splices the children of each embedded member right after it. Names already
    /// present at this level shadow promoted ones.
    fn promote(&mut self, id: SchemaNodeId, embedded: &[SchemaNodeId]) {
        if embedded.is_empty() {
            return;
        }
        let mut children = self.nodes[id.0].children.clone();
        let mut names: HashSet<String> = children
            .iter()
            .map(|c| self.nodes[c.0].name.clone())
            .collect();

        for member in embedded {
            let Some(at) = children.iter().position(|c| c == member) else {
                continue;
            };
            let mut insert_at = at + 1;
            for promoted in self.effective_children(*member) {
                let name = &self.nodes[promoted.0].name;
                if names.insert(name.clone()) {
                    children.insert(insert_at, promoted);
                    insert_at += 1;
                }
            }
        }
        self.nodes[id.0].children = children;
    }
}

#[cfg(test)]
mod tests;
