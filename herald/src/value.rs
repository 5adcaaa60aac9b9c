//! Type tags and type-erased argument values.
//!
//! Handler parameters are described as data, so the framework needs a runtime
//! identity for "the type this argument parses into" ([`TypeTag`]) and a box
//! that can carry any parsed value between a parser and a handler ([`Value`]).

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime identity of a Rust type.
///
/// Equality and hashing only consider the underlying [`TypeId`]; the name is
/// for messages and the zero-value constructor is optional metadata.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
    zero: Option<fn() -> Value>,
}

impl TypeTag {
    /// Tag for `T` without a zero value.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            zero: None,
        }
    }

    /// Tag for `T` whose zero value is `T::default()`.
    pub fn with_zero<T: Default + Send + Sync + 'static>() -> Self {
        Self {
            zero: Some(zero_of::<T>),
            ..Self::of::<T>()
        }
    }

    /// Underlying type id.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name (e.g. `alloc::string::String`).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path (e.g. `String`).
    ///
    /// Generic names are returned unchanged.
    pub fn short_name(&self) -> &'static str {
        if self.name.contains('<') {
            return self.name;
        }
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    /// The type's zero value, if the tag was built with one.
    pub fn zero(&self) -> Option<Value> {
        self.zero.map(|make| make())
    }

    /// Whether this tag identifies `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

fn zero_of<T: Default + Send + Sync + 'static>() -> Value {
    Value::new(T::default())
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased, cheaply clonable value.
///
/// Clones share the same allocation, so a default value handed to many
/// invocations is never copied.
#[derive(Clone)]
pub struct Value {
    tag: TypeTag,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Value {
    /// Box a value.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            tag: TypeTag::of::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Tag of the boxed value's type.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Whether the boxed value is a `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.tag.is::<T>()
    }

    /// Borrow the boxed value as `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.inner).downcast_ref::<T>()
    }

    /// Whether two values share the same allocation.
    pub fn ptr_eq(a: &Value, b: &Value) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.tag.short_name())
            .finish_non_exhaustive()
    }
}

/// Declared type of a handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredType {
    /// The parameter is exactly this type.
    Plain(TypeTag),

    /// The parameter is `Option<inner>`; `wrapper` is the tag of the option itself.
    Nullable { wrapper: TypeTag, inner: TypeTag },
}

impl DeclaredType {
    /// Plain `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Plain(TypeTag::of::<T>())
    }

    /// Plain `T` whose zero value is `T::default()`.
    pub fn of_default<T: Default + Send + Sync + 'static>() -> Self {
        Self::Plain(TypeTag::with_zero::<T>())
    }

    /// `Option<T>`.
    pub fn nullable<T: 'static>() -> Self {
        Self::Nullable {
            wrapper: TypeTag::of::<Option<T>>(),
            inner: TypeTag::of::<T>(),
        }
    }

    /// Tag of the type as written in the declaration.
    pub fn declared(&self) -> TypeTag {
        match self {
            Self::Plain(tag) => *tag,
            Self::Nullable { wrapper, .. } => *wrapper,
        }
    }

    /// Tag of the value a parser has to produce.
    pub fn value_type(&self) -> TypeTag {
        match self {
            Self::Plain(tag) => *tag,
            Self::Nullable { inner, .. } => *inner,
        }
    }

    /// Whether this is a nullable wrapper.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Nullable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tag_equality_ignores_zero() {
        assert_eq!(TypeTag::of::<u32>(), TypeTag::with_zero::<u32>());
        assert_ne!(TypeTag::of::<u32>(), TypeTag::of::<u64>());

        let set: HashSet<TypeTag> = [TypeTag::of::<u32>(), TypeTag::with_zero::<u32>()]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeTag::of::<String>().short_name(), "String");
        assert_eq!(TypeTag::of::<u8>().short_name(), "u8");
        assert!(TypeTag::of::<Option<String>>().short_name().starts_with("core::option::Option<"));
    }

    #[test]
    fn test_zero_value() {
        assert!(TypeTag::of::<i64>().zero().is_none());

        let zero = TypeTag::with_zero::<i64>().zero().unwrap();
        assert_eq!(zero.downcast_ref::<i64>(), Some(&0));
    }

    #[test]
    fn test_value_downcast_and_sharing() {
        let value = Value::new("hello".to_string());
        assert!(value.is::<String>());
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("hello"));
        assert!(value.downcast_ref::<&str>().is_none());

        let clone = value.clone();
        assert!(Value::ptr_eq(&value, &clone));
        assert!(!Value::ptr_eq(&value, &Value::new("hello".to_string())));
    }

    #[test]
    fn test_declared_type_tags() {
        let plain = DeclaredType::of::<u16>();
        assert_eq!(plain.declared(), plain.value_type());
        assert!(!plain.is_nullable());

        let nullable = DeclaredType::nullable::<u16>();
        assert!(nullable.is_nullable());
        assert!(nullable.declared().is::<Option<u16>>());
        assert!(nullable.value_type().is::<u16>());
    }
}
