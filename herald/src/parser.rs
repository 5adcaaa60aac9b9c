//! Argument value parsers
//!
//! A parser binding turns one raw string value into a typed [`Value`] for the
//! type tag it is registered under. Applications usually implement the typed
//! [`ValueParser<T>`] and register it through
//! [`Registry::register_parser`](crate::Registry::register_parser), which
//! wraps it in a [`TypedParser`].

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::CommandContext;
use crate::value::{TypeTag, Value};

/// A raw value could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot parse {value:?} as {target}: {reason}")]
pub struct ParseError {
    /// Raw value
    pub value: String,
    /// Short name of the target type
    pub target: String,
    /// Why parsing failed
    pub reason: String,
}

impl ParseError {
    /// Create a parse error for `value` targeting `target`
    pub fn new(value: impl Into<String>, target: TypeTag, reason: impl fmt::Display) -> Self {
        Self {
            value: value.into(),
            target: target.short_name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Type-erased parser binding stored in the registry
#[async_trait]
pub trait ArgumentParser: Send + Sync {
    /// Type this parser produces
    fn target(&self) -> TypeTag;

    /// Parse a raw value
    async fn parse(&self, value: &str, context: &dyn CommandContext) -> Result<Value, ParseError>;
}

impl fmt::Debug for dyn ArgumentParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentParser")
            .field("target", &self.target())
            .finish()
    }
}

/// Typed parser for values of `T`
#[async_trait]
pub trait ValueParser<T>: Send + Sync {
    /// Parse a raw value into a `T`
    async fn parse(&self, value: &str, context: &dyn CommandContext) -> Result<T, ParseError>;
}

/// Adapter exposing a [`ValueParser<T>`] as an [`ArgumentParser`]
pub struct TypedParser<T, P> {
    inner: P,
    _marker: PhantomData<fn() -> T>,
}

impl<T, P> TypedParser<T, P> {
    /// Wrap a typed parser
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// The wrapped parser
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<T, P> ArgumentParser for TypedParser<T, P>
where
    T: Send + Sync + 'static,
    P: ValueParser<T>,
{
    fn target(&self) -> TypeTag {
        TypeTag::of::<T>()
    }

    async fn parse(&self, value: &str, context: &dyn CommandContext) -> Result<Value, ParseError> {
        self.inner.parse(value, context).await.map(Value::new)
    }
}

/// Parser for any `T: FromStr`
pub struct FromStrParser<T>(PhantomData<fn() -> T>);

impl<T> FromStrParser<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for FromStrParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> ValueParser<T> for FromStrParser<T>
where
    T: FromStr + Send + 'static,
    T::Err: fmt::Display,
{
    async fn parse(&self, value: &str, _context: &dyn CommandContext) -> Result<T, ParseError> {
        value
            .parse::<T>()
            .map_err(|e| ParseError::new(value, TypeTag::of::<T>(), e))
    }
}

/// Parser backed by a synchronous closure
///
/// # Example
///
/// ```
/// use herald::parser::{FnParser, ParseError};
/// use herald::{Registry, TypeTag};
/// use std::time::Duration;
///
/// let registry = Registry::new();
/// registry
///     .register_parser::<Duration, _>(FnParser(|raw: &str, _: &dyn herald::CommandContext| {
///         raw.strip_suffix('s')
///             .and_then(|secs| secs.parse().ok())
///             .map(Duration::from_secs)
///             .ok_or_else(|| ParseError::new(raw, TypeTag::of::<Duration>(), "expected e.g. 30s"))
///     }))
///     .unwrap();
/// ```
pub struct FnParser<F>(pub F);

#[async_trait]
impl<T, F> ValueParser<T> for FnParser<F>
where
    T: Send + 'static,
    F: Fn(&str, &dyn CommandContext) -> Result<T, ParseError> + Send + Sync,
{
    async fn parse(&self, value: &str, context: &dyn CommandContext) -> Result<T, ParseError> {
        (self.0)(value, context)
    }
}

/// Parsers for `String`, `bool`, `char`, every integer width, `f32` and `f64`
pub fn builtin_parsers() -> Vec<Arc<dyn ArgumentParser>> {
    macro_rules! from_str {
        ($($ty:ty),* $(,)?) => {
            vec![$(
                Arc::new(TypedParser::<$ty, _>::new(FromStrParser::<$ty>::new()))
                    as Arc<dyn ArgumentParser>
            ),*]
        };
    }

    from_str![
        String, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32,
        f64,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BasicContext;

    fn ctx() -> BasicContext {
        BasicContext::new("tester", "")
    }

    #[tokio::test]
    async fn test_from_str_parser() {
        let parser = TypedParser::<u16, _>::new(FromStrParser::<u16>::new());
        assert!(parser.target().is::<u16>());

        let value = parser.parse("8080", &ctx()).await.unwrap();
        assert_eq!(value.downcast_ref::<u16>(), Some(&8080));

        let err = parser.parse("99999", &ctx()).await.unwrap_err();
        assert_eq!(err.value, "99999");
        assert_eq!(err.target, "u16");
        assert!(err.to_string().starts_with("Cannot parse \"99999\" as u16"));
    }

    #[tokio::test]
    async fn test_fn_parser_sees_context() {
        let parser = TypedParser::<String, _>::new(FnParser(
            |raw: &str, context: &dyn CommandContext| -> Result<String, ParseError> {
                if raw == "me" {
                    Ok(context.user().id().to_string())
                } else {
                    Ok(raw.to_string())
                }
            },
        ));

        let value = parser.parse("me", &ctx()).await.unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("tester"));
    }

    #[tokio::test]
    async fn test_builtin_parsers() {
        let parsers = builtin_parsers();
        assert_eq!(parsers.len(), 17);

        let find = |tag: TypeTag| parsers.iter().find(|p| p.target() == tag).unwrap().clone();

        let flag = find(TypeTag::of::<bool>()).parse("true", &ctx()).await.unwrap();
        assert_eq!(flag.downcast_ref::<bool>(), Some(&true));

        let ratio = find(TypeTag::of::<f64>()).parse("0.25", &ctx()).await.unwrap();
        assert_eq!(ratio.downcast_ref::<f64>(), Some(&0.25));

        let text = find(TypeTag::of::<String>()).parse("two words", &ctx()).await.unwrap();
        assert_eq!(text.downcast_ref::<String>().map(String::as_str), Some("two words"));

        assert!(find(TypeTag::of::<i8>()).parse("-129", &ctx()).await.is_err());
        assert!(find(TypeTag::of::<char>()).parse("ab", &ctx()).await.is_err());
    }
}
