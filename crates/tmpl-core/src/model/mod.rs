//! Data-model introspection
//!
//! A [`Model`] describes its static shape through [`TypeInfo`] and exposes its live
//! state through [`Value`] (for execution) and [`FieldRef`]s (for fragment
//! discovery). Structs get both from `#[derive(Model)]`; primitives and std
//! containers are covered by the impls in this module.

mod impls;
mod value;

use std::fmt;
use std::path::PathBuf;

pub use value::{Accessor, Object, Value};

use crate::watch::Watch;

/// Lazily evaluated type description. Members refer to their types through this so
/// that self-referential shapes can be described without recursing at definition.
pub type TypeRef = fn() -> TypeInfo;

/// Shape class of a type or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Complex,
    String,
    Struct,
    Sequence,
    Map,
    /// Pointer-like: `Option<T>`.
    Optional,
    /// Interface-like: the concrete shape is only known from a runtime value.
    Dynamic,
    Unit,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::Complex => "complex",
            Kind::String => "string",
            Kind::Struct => "struct",
            Kind::Sequence => "slice",
            Kind::Map => "map",
            Kind::Optional => "pointer",
            Kind::Dynamic => "interface",
            Kind::Unit => "unit",
        }
    }

    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Kind::Bool | Kind::Int | Kind::Uint | Kind::Float | Kind::Complex | Kind::String
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a type.
#[derive(Clone)]
pub struct TypeInfo {
    name: &'static str,
    path: &'static str,
    kind: Kind,
    members: Vec<MemberInfo>,
    accessors: Vec<AccessorInfo>,
    element: Option<TypeRef>,
}

impl TypeInfo {
    fn new(name: &'static str, path: &'static str, kind: Kind) -> Self {
        Self {
            name,
            path,
            kind,
            members: Vec::new(),
            accessors: Vec::new(),
            element: None,
        }
    }

    pub fn scalar(name: &'static str, kind: Kind) -> Self {
        Self::new(name, name, kind)
    }

    /// A struct-like type. `name` is the display and entry name, `path` the fully
    /// qualified name used to tell types apart.
    pub fn aggregate(name: &'static str, path: &'static str) -> Self {
        Self::new(name, path, Kind::Struct)
    }

    pub fn sequence(path: &'static str, element: TypeRef) -> Self {
        Self::new(path, path, Kind::Sequence).with_element(element)
    }

    pub fn optional(path: &'static str, element: TypeRef) -> Self {
        Self::new(path, path, Kind::Optional).with_element(element)
    }

    pub fn map(path: &'static str, element: TypeRef) -> Self {
        Self::new(path, path, Kind::Map).with_element(element)
    }

    pub fn dynamic(path: &'static str) -> Self {
        Self::new(path, path, Kind::Dynamic)
    }

    fn with_element(mut self, element: TypeRef) -> Self {
        self.element = Some(element);
        self
    }

    pub fn member(mut self, member: MemberInfo) -> Self {
        self.members.push(member);
        self
    }

    pub fn accessor(mut self, name: &'static str, returns: TypeRef) -> Self {
        self.accessors.push(AccessorInfo { name, returns });
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn members(&self) -> &[MemberInfo] {
        &self.members
    }

    pub fn accessors(&self) -> &[AccessorInfo] {
        &self.accessors
    }

    pub fn element(&self) -> Option<TypeInfo> {
        self.element.map(|element| element())
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("members", &self.members)
            .field("accessors", &self.accessors)
            .finish()
    }
}

/// One declared member of an aggregate.
#[derive(Clone)]
pub struct MemberInfo {
    name: &'static str,
    tag: Option<&'static str>,
    embedded: bool,
    ty: TypeRef,
}

impl MemberInfo {
    pub fn new(name: &'static str, ty: TypeRef) -> Self {
        Self {
            name,
            tag: None,
            embedded: false,
            ty,
        }
    }

    /// Binding-name override.
    pub fn with_tag(mut self, tag: &'static str) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Marks the member as anonymous: its members are promoted into the parent.
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tag(&self) -> Option<&'static str> {
        self.tag
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// The name templates address this member by.
    pub fn binding_name(&self) -> &'static str {
        self.tag.unwrap_or(self.name)
    }

    pub fn type_info(&self) -> TypeInfo {
        (self.ty)()
    }
}

impl fmt::Debug for MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("embedded", &self.embedded)
            .finish()
    }
}

/// A zero-argument accessor exposed as a pseudo-field.
#[derive(Clone)]
pub struct AccessorInfo {
    name: &'static str,
    returns: TypeRef,
}

impl AccessorInfo {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn returns(&self) -> TypeInfo {
        (self.returns)()
    }
}

impl fmt::Debug for AccessorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorInfo")
            .field("name", &self.name)
            .finish()
    }
}

/// A live member value, as seen by fragment discovery.
pub struct FieldRef<'a> {
    pub name: &'static str,
    pub tag: Option<&'static str>,
    pub embedded: bool,
    pub value: &'a dyn Model,
}

impl<'a> FieldRef<'a> {
    pub fn new(
        name: &'static str,
        tag: Option<&'static str>,
        embedded: bool,
        value: &'a dyn Model,
    ) -> Self {
        Self {
            name,
            tag,
            embedded,
            value,
        }
    }

    pub fn binding_name(&self) -> &'static str {
        self.tag.unwrap_or(self.name)
    }
}

/// Where a fragment's template text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Text(String),
    /// Read at discovery time, on every compilation.
    File(PathBuf),
}

/// Hand-written source provider, used by `#[tmpl(provider)]`.
pub trait TemplateProvider {
    fn template_source(&self) -> Source;
}

/// A type the compiler can introspect, execute against and discover fragments in.
pub trait Model: Send + Sync {
    fn type_info() -> TypeInfo
    where
        Self: Sized;

    fn to_value(&self) -> Value;

    fn fields(&self) -> Vec<FieldRef<'_>> {
        Vec::new()
    }

    /// Items of a sequence, or the pointee of a present optional.
    fn elements(&self) -> Vec<&dyn Model> {
        Vec::new()
    }

    fn source(&self) -> Option<Source> {
        None
    }

    fn watcher(&self) -> Option<&dyn Watch> {
        None
    }
}
