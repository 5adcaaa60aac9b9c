//! Handler parameter declarations and the arguments built from them.

use thiserror::Error;

use crate::value::{DeclaredType, TypeTag, Value};

/// How a parameter passes data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamKind {
    /// Regular input parameter (the only kind commands accept)
    #[default]
    In,
    /// Output-only parameter
    Out,
    /// Return-value slot
    Retval,
}

/// Nullability annotation on a parameter whose type is not a nullable wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nullability {
    /// No annotation
    #[default]
    Unknown,
    /// Explicitly non-null
    NotNull,
    /// May be absent
    Nullable,
}

/// External declaration of a single handler parameter.
///
/// This is the raw material [`Argument`]s are built from, either written by
/// hand or generated by the `#[command]` attribute.
///
/// # Example
///
/// ```
/// use herald::{DeclaredType, ParamDecl};
///
/// let reason = ParamDecl::new("reason", DeclaredType::nullable::<String>())
///     .default("no reason given".to_string());
/// assert_eq!(reason.name.as_deref(), Some("reason"));
/// ```
#[derive(Debug, Clone)]
pub struct ParamDecl {
    /// Parameter name
    pub name: Option<String>,

    /// Position in the handler's parameter list
    pub position: usize,

    /// Declared type
    pub ty: DeclaredType,

    /// Nullability annotation
    pub nullability: Nullability,

    /// Declared default value
    pub default_value: Option<Value>,

    /// Parameter kind
    pub kind: ParamKind,
}

impl ParamDecl {
    /// Create a named input parameter.
    pub fn new(name: impl Into<String>, ty: DeclaredType) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::unnamed(ty)
        }
    }

    /// Create an input parameter without a name.
    pub fn unnamed(ty: DeclaredType) -> Self {
        Self {
            name: None,
            position: 0,
            ty,
            nullability: Nullability::Unknown,
            default_value: None,
            kind: ParamKind::In,
        }
    }

    /// Set the position
    pub fn position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Annotate as nullable
    pub fn nullable(mut self) -> Self {
        self.nullability = Nullability::Nullable;
        self
    }

    /// Set the nullability annotation
    pub fn nullability(mut self, nullability: Nullability) -> Self {
        self.nullability = nullability;
        self
    }

    /// Set the default value
    pub fn default<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.default_value(Value::new(value))
    }

    /// Set the default value from an already boxed value
    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Set the parameter kind
    pub fn kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Errors raised while building an [`Argument`] from a malformed declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("Parameter #{position} has no name")]
    MissingName { position: usize },

    #[error("Parameter '{name}' type ({declared}) doesn't match the argument type ({expected})")]
    TypeMismatch {
        name: String,
        declared: String,
        expected: String,
    },

    #[error("Parameter '{name}' default value is a {actual}, not a {expected}")]
    DefaultTypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Parameter '{name}' is an output parameter, which is unsupported in command handlers")]
    OutputParameter { name: String },

    #[error("Parameter '{name}' is a return-value parameter, which is unsupported in command handlers")]
    ReturnValueParameter { name: String },
}

/// One formal parameter of a command.
///
/// Immutable once built; owned by the [`Command`](crate::Command) it belongs to.
#[derive(Debug, Clone)]
pub struct Argument {
    name: String,
    value_type: TypeTag,
    is_optional: bool,
    default_value: Option<Value>,
}

impl Argument {
    /// Build an argument from a parameter declaration.
    ///
    /// Optionality is derived from the declaration alone:
    /// a nullable wrapper is unwrapped and becomes optional, otherwise a
    /// nullable annotation makes the argument optional, otherwise it is
    /// required. The default is the declared default, falling back to the
    /// type's zero value when the tag carries one. A declared default must
    /// hold the argument's value type (the unwrapped type for a nullable
    /// wrapper).
    pub fn from_decl(decl: &ParamDecl) -> Result<Self, ArgumentError> {
        let name = Self::checked_name(decl)?;

        match decl.kind {
            ParamKind::In => {}
            ParamKind::Out => return Err(ArgumentError::OutputParameter { name }),
            ParamKind::Retval => return Err(ArgumentError::ReturnValueParameter { name }),
        }

        let (value_type, is_optional) = match decl.ty {
            DeclaredType::Nullable { inner, .. } => (inner, true),
            DeclaredType::Plain(tag) => (tag, decl.nullability == Nullability::Nullable),
        };

        let default_value = match &decl.default_value {
            Some(value) if value.tag() != value_type => {
                return Err(ArgumentError::DefaultTypeMismatch {
                    name,
                    expected: value_type.name().to_string(),
                    actual: value.tag().name().to_string(),
                });
            }
            Some(value) => Some(value.clone()),
            // A nullable wrapper's zero value is "absent".
            None if decl.ty.is_nullable() => None,
            None => value_type.zero(),
        };

        Ok(Self {
            name,
            value_type,
            is_optional,
            default_value,
        })
    }

    /// Build an argument for `T`, checking the declared type is exactly `T`.
    ///
    /// For a nullable wrapper, `T` is the wrapper type (e.g. `Option<i64>`).
    pub fn typed<T: ?Sized + 'static>(decl: &ParamDecl) -> Result<Self, ArgumentError> {
        let name = Self::checked_name(decl)?;
        let expected = TypeTag::of::<T>();

        if decl.ty.declared() != expected {
            return Err(ArgumentError::TypeMismatch {
                name,
                declared: decl.ty.declared().name().to_string(),
                expected: expected.name().to_string(),
            });
        }

        Self::from_decl(decl)
    }

    fn checked_name(decl: &ParamDecl) -> Result<String, ArgumentError> {
        match decl.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Err(ArgumentError::MissingName {
                position: decl.position,
            }),
        }
    }

    /// Argument name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type the raw value is parsed into
    pub fn value_type(&self) -> TypeTag {
        self.value_type
    }

    /// Whether the argument may be omitted
    pub fn is_optional(&self) -> bool {
        self.is_optional
    }

    /// Value used when an optional argument is omitted
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }
}
