use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::Arc;

use super::{FieldRef, Kind, Model, Source, TypeInfo, Value};
use crate::watch::Watch;

macro_rules! impl_scalar_model {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Model for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::scalar(stringify!($ty), Kind::$kind)
                }

                fn to_value(&self) -> Value {
                    Value::from(*self)
                }
            }
        )*
    };
}

impl_scalar_model!(
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Uint,
    u16 => Uint,
    u32 => Uint,
    u64 => Uint,
    f32 => Float,
    f64 => Float,
);

impl Model for isize {
    fn type_info() -> TypeInfo {
        TypeInfo::scalar("isize", Kind::Int)
    }

    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl Model for usize {
    fn type_info() -> TypeInfo {
        TypeInfo::scalar("usize", Kind::Uint)
    }

    fn to_value(&self) -> Value {
        Value::Uint(*self as u64)
    }
}

impl Model for char {
    fn type_info() -> TypeInfo {
        TypeInfo::scalar("char", Kind::String)
    }

    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl Model for String {
    fn type_info() -> TypeInfo {
        TypeInfo::scalar("string", Kind::String)
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl Model for &'static str {
    fn type_info() -> TypeInfo {
        TypeInfo::scalar("string", Kind::String)
    }

    fn to_value(&self) -> Value {
        Value::String((*self).to_string())
    }
}

impl Model for () {
    fn type_info() -> TypeInfo {
        TypeInfo::scalar("()", Kind::Unit)
    }

    fn to_value(&self) -> Value {
        Value::Nil
    }
}

impl Model for Value {
    fn type_info() -> TypeInfo {
        TypeInfo::dynamic("Value")
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl Model for serde_json::Value {
    fn type_info() -> TypeInfo {
        TypeInfo::dynamic("serde_json::Value")
    }

    fn to_value(&self) -> Value {
        Value::from_json(self.clone())
    }
}

// Smart pointers are transparent: same shape, same value, same capabilities.
macro_rules! impl_transparent_model {
    ($($wrapper:ident),*) => {
        $(
            impl<T: Model> Model for $wrapper<T> {
                fn type_info() -> TypeInfo {
                    T::type_info()
                }

                fn to_value(&self) -> Value {
                    (**self).to_value()
                }

                fn fields(&self) -> Vec<FieldRef<'_>> {
                    (**self).fields()
                }

                fn elements(&self) -> Vec<&dyn Model> {
                    (**self).elements()
                }

                fn source(&self) -> Option<Source> {
                    (**self).source()
                }

                fn watcher(&self) -> Option<&dyn Watch> {
                    (**self).watcher()
                }
            }
        )*
    };
}

impl_transparent_model!(Box, Arc);

impl<T: Model> Model for &T {
    fn type_info() -> TypeInfo {
        T::type_info()
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn fields(&self) -> Vec<FieldRef<'_>> {
        (**self).fields()
    }

    fn elements(&self) -> Vec<&dyn Model> {
        (**self).elements()
    }

    fn source(&self) -> Option<Source> {
        (**self).source()
    }

    fn watcher(&self) -> Option<&dyn Watch> {
        (**self).watcher()
    }
}

impl<T: Model> Model for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::optional(std::any::type_name::<Self>(), T::type_info)
    }

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Nil,
        }
    }

    fn elements(&self) -> Vec<&dyn Model> {
        match self {
            Some(inner) => vec![inner as &dyn Model],
            None => Vec::new(),
        }
    }
}

impl<T: Model> Model for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::sequence(std::any::type_name::<Self>(), T::type_info)
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Model::to_value).collect())
    }

    fn elements(&self) -> Vec<&dyn Model> {
        self.iter().map(|item| item as &dyn Model).collect()
    }
}

impl<T: Model, const N: usize> Model for [T; N] {
    fn type_info() -> TypeInfo {
        TypeInfo::sequence(std::any::type_name::<Self>(), T::type_info)
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(Model::to_value).collect())
    }

    fn elements(&self) -> Vec<&dyn Model> {
        self.iter().map(|item| item as &dyn Model).collect()
    }
}

impl<V: Model> Model for BTreeMap<String, V> {
    fn type_info() -> TypeInfo {
        TypeInfo::map(std::any::type_name::<Self>(), V::type_info)
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }

    fn elements(&self) -> Vec<&dyn Model> {
        self.values().map(|v| v as &dyn Model).collect()
    }
}

impl<V: Model, S: BuildHasher + Send + Sync> Model for HashMap<String, V, S> {
    fn type_info() -> TypeInfo {
        TypeInfo::map(std::any::type_name::<Self>(), V::type_info)
    }

    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }

    fn elements(&self) -> Vec<&dyn Model> {
        // Sorted so discovery order does not depend on the hasher.
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, v)| v as &dyn Model).collect()
    }
}
