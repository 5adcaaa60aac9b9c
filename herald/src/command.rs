//! Handler declarations and the commands built from them.
//!
//! A [`HandlerDecl`] is the data-in side: name, aliases, owning controller,
//! ordered parameters and the bound handler function. [`Command::new`]
//! validates it once and produces the immutable, introspectable [`Command`]
//! the registry stores and the dispatcher runs.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::argument::{Argument, ArgumentError, ParamDecl};
use crate::dispatch::{DispatchError, HandlerFn, Invocation};
use crate::permission::{PermissionRequirement, RequirementCheck};
use crate::value::TypeTag;

/// Identity of the controller type a handler belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(TypeTag);

impl ControllerId {
    /// Identity of controller type `C`.
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self(TypeTag::of::<C>())
    }

    /// Controller type name without module path.
    pub fn name(&self) -> &'static str {
        self.0.short_name()
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.name())
    }
}

/// Declaration of a single command handler.
///
/// # Example
///
/// ```
/// use herald::{DeclaredType, HandlerDecl, Invocation, ParamDecl};
///
/// struct ModController;
///
/// let decl = HandlerDecl::new("kick")
///     .alias("k")
///     .controller::<ModController>()
///     .param(ParamDecl::new("user", DeclaredType::of::<String>()))
///     .handler(|_invocation: Invocation| async { Ok(()) });
/// assert_eq!(decl.ident(), "kick");
/// ```
#[derive(Clone)]
pub struct HandlerDecl {
    ident: String,
    name: Option<String>,
    aliases: Vec<String>,
    description: Option<String>,
    declared_by: Option<ControllerId>,
    generic_params: Vec<String>,
    params: Vec<ParamDecl>,
    requirement: Option<Arc<dyn RequirementCheck>>,
    handler: Option<HandlerFn>,
}

impl HandlerDecl {
    /// Start a declaration for the handler identified by `ident`.
    pub fn new(ident: impl Into<String>) -> Self {
        Self {
            ident: ident.into(),
            name: None,
            aliases: Vec::new(),
            description: None,
            declared_by: None,
            generic_params: Vec::new(),
            params: Vec::new(),
            requirement: None,
            handler: None,
        }
    }

    /// Handler identifier
    pub fn ident(&self) -> &str {
        &self.ident
    }

    /// Explicit command name (defaults to the handler identifier)
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an alias
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add several aliases
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Set the help description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the declaring controller
    pub fn declared_by(mut self, controller: ControllerId) -> Self {
        self.declared_by = Some(controller);
        self
    }

    /// Set the declaring controller by type
    pub fn controller<C: ?Sized + 'static>(self) -> Self {
        self.declared_by(ControllerId::of::<C>())
    }

    /// Record an unresolved generic type parameter
    pub fn generic_param(mut self, name: impl Into<String>) -> Self {
        self.generic_params.push(name.into());
        self
    }

    /// Append a parameter; its position is its index in the list
    pub fn param(mut self, param: ParamDecl) -> Self {
        let position = self.params.len();
        self.params.push(param.position(position));
        self
    }

    /// Require permissions before the handler may run
    pub fn require<P>(mut self, requirement: PermissionRequirement<P>) -> Self
    where
        P: fmt::Debug + Send + Sync + 'static,
    {
        self.requirement = Some(Arc::new(requirement));
        self
    }

    /// Bind the handler function
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |invocation| handler(invocation).boxed()));
        self
    }
}

impl fmt::Debug for HandlerDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDecl")
            .field("ident", &self.ident)
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("declared_by", &self.declared_by)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Errors raised while building a [`Command`] from a malformed declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{handler} is not declared by controller {asserted} (declared by {declared})")]
    ControllerMismatch {
        handler: String,
        asserted: String,
        declared: String,
    },

    #[error("Cannot infer the controller for {handler}: no declaring controller given")]
    UnknownController { handler: String },

    #[error("{handler} contains generic parameters ({params}), which are unsupported in command handlers")]
    GenericParameters { handler: String, params: String },

    #[error("{handler} has no handler function bound")]
    MissingHandler { handler: String },

    #[error("{handler} has an empty name or alias")]
    EmptyIdentifier { handler: String },

    #[error("{handler} declares argument '{argument}' more than once")]
    DuplicateArgument { handler: String, argument: String },

    #[error("{handler}: required argument '{required}' follows optional argument '{optional}'")]
    RequiredAfterOptional {
        handler: String,
        required: String,
        optional: String,
    },

    #[error("Invalid parameter in {handler}: {source}")]
    Argument {
        handler: String,
        #[source]
        source: ArgumentError,
    },
}

/// Which side of the valid range a value count fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountErrorKind {
    TooFew,
    TooMany,
}

impl CountErrorKind {
    fn lead(&self) -> &'static str {
        match self {
            Self::TooFew => "Not enough",
            Self::TooMany => "Too many",
        }
    }
}

/// A command was given a number of values outside its valid range.
///
/// This is a usage error: embedding applications report it to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{} values provided to the {} command; expected between {} and {}, but got {}",
    .kind.lead(), .command, .min, .max, .supplied
)]
pub struct ArgumentCountError {
    pub kind: CountErrorKind,
    pub command: String,
    pub supplied: usize,
    pub min: usize,
    pub max: usize,
}

/// A registered, invocable handler description.
pub struct Command {
    name: String,
    aliases: Vec<String>,
    controller: ControllerId,
    arguments: Vec<Argument>,
    description: Option<String>,
    requirement: Option<Arc<dyn RequirementCheck>>,
    handler: HandlerFn,
}

impl Command {
    /// Build a command from a handler declaration.
    ///
    /// If `controller` is given, the handler must be declared by it;
    /// otherwise the declaring controller is used.
    ///
    /// Optional arguments must form a trailing suffix: a required argument
    /// after an optional one is rejected, so that the first `n` arguments are
    /// always the right ones to fill for `n` supplied values.
    pub fn new(decl: HandlerDecl, controller: Option<ControllerId>) -> Result<Self, CommandError> {
        let handler_name = match decl.declared_by {
            Some(declared) => format!("{}.{}", declared.name(), decl.ident),
            None => decl.ident.clone(),
        };

        let controller = match (controller, decl.declared_by) {
            (Some(asserted), Some(declared)) if asserted == declared => asserted,
            (Some(asserted), declared) => {
                return Err(CommandError::ControllerMismatch {
                    handler: handler_name,
                    asserted: asserted.to_string(),
                    declared: declared
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "nothing".to_string()),
                })
            }
            (None, Some(declared)) => declared,
            (None, None) => return Err(CommandError::UnknownController { handler: handler_name }),
        };

        if !decl.generic_params.is_empty() {
            return Err(CommandError::GenericParameters {
                handler: handler_name,
                params: decl.generic_params.join(", "),
            });
        }

        let handler = decl.handler.ok_or_else(|| CommandError::MissingHandler {
            handler: handler_name.clone(),
        })?;

        let name = decl.name.unwrap_or(decl.ident);
        if name.is_empty() || decl.aliases.iter().any(String::is_empty) {
            return Err(CommandError::EmptyIdentifier { handler: handler_name });
        }

        let aliases = dedupe_aliases(&name, decl.aliases);

        let arguments = decl
            .params
            .iter()
            .map(Argument::from_decl)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| CommandError::Argument {
                handler: handler_name.clone(),
                source,
            })?;

        let mut seen = HashSet::new();
        if let Some(duplicate) = arguments.iter().find(|a| !seen.insert(a.name())) {
            return Err(CommandError::DuplicateArgument {
                handler: handler_name,
                argument: duplicate.name().to_string(),
            });
        }

        if let Some(optional) = arguments.iter().position(Argument::is_optional) {
            if let Some(required) = arguments[optional..].iter().find(|a| !a.is_optional()) {
                return Err(CommandError::RequiredAfterOptional {
                    handler: handler_name,
                    required: required.name().to_string(),
                    optional: arguments[optional].name().to_string(),
                });
            }
        }

        Ok(Self {
            name,
            aliases,
            controller,
            arguments,
            description: decl.description,
            requirement: decl.requirement,
            handler,
        })
    }

    /// Primary identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Additional identifiers (deduplicated case-insensitively, never the name)
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Name followed by every alias
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Whether `id` refers to this command, ignoring case
    pub fn is_identified_by(&self, id: &str) -> bool {
        let id = normalize(id);
        self.identifiers().any(|known| normalize(known) == id)
    }

    /// Controller the handler belongs to
    pub fn controller(&self) -> ControllerId {
        self.controller
    }

    /// Ordered arguments
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Help description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Permission requirement checked before the handler runs
    pub fn requirement(&self) -> Option<&Arc<dyn RequirementCheck>> {
        self.requirement.as_ref()
    }

    pub(crate) fn handler(&self) -> &HandlerFn {
        &self.handler
    }

    /// Number of optional arguments
    pub fn optional_argument_count(&self) -> usize {
        self.arguments.iter().filter(|a| a.is_optional()).count()
    }

    /// Inclusive range of value counts the command accepts
    pub fn valid_argument_count(&self) -> (usize, usize) {
        let max = self.arguments.len();
        (max - self.optional_argument_count(), max)
    }

    /// Arguments to fill for `val_count` supplied values.
    pub fn arguments_to_use(&self, val_count: usize) -> Result<&[Argument], ArgumentCountError> {
        let (min, max) = self.valid_argument_count();
        let kind = if val_count < min {
            CountErrorKind::TooFew
        } else if val_count > max {
            CountErrorKind::TooMany
        } else {
            return Ok(&self.arguments[..val_count]);
        };

        Err(ArgumentCountError {
            kind,
            command: self.name.clone(),
            supplied: val_count,
            min,
            max,
        })
    }

    /// One-line usage, e.g. `kick <user> [reason]`
    pub fn usage(&self) -> String {
        self.arguments.iter().fold(self.name.clone(), |mut usage, arg| {
            if arg.is_optional() {
                usage.push_str(&format!(" [{}]", arg.name()));
            } else {
                usage.push_str(&format!(" <{}>", arg.name()));
            }
            usage
        })
    }

    /// Serializable snapshot for help listings and tooling
    pub fn info(&self) -> CommandInfo {
        let (min_args, max_args) = self.valid_argument_count();
        CommandInfo {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            description: self.description.clone(),
            controller: self.controller.name().to_string(),
            arguments: self
                .arguments
                .iter()
                .map(|arg| ArgumentInfo {
                    name: arg.name().to_string(),
                    value_type: arg.value_type().short_name().to_string(),
                    optional: arg.is_optional(),
                    has_default: arg.default_value().is_some(),
                })
                .collect(),
            min_args,
            max_args,
            usage: self.usage(),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("controller", &self.controller)
            .field("arguments", &self.arguments)
            .field("requirement", &self.requirement)
            .finish_non_exhaustive()
    }
}

/// Serializable description of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub name: String,

    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    pub controller: String,

    #[serde(default)]
    pub arguments: Vec<ArgumentInfo>,

    pub min_args: usize,
    pub max_args: usize,
    pub usage: String,
}

/// Serializable description of an argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentInfo {
    pub name: String,
    pub value_type: String,
    pub optional: bool,
    pub has_default: bool,
}

/// Case-folded form used for identifier comparison.
pub(crate) fn normalize(id: &str) -> String {
    id.to_lowercase()
}

fn dedupe_aliases(name: &str, aliases: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::from([normalize(name)]);
    aliases
        .into_iter()
        .filter(|alias| seen.insert(normalize(alias)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionsMode;
    use crate::value::DeclaredType;

    struct ModController;
    struct OtherController;

    fn kick_decl() -> HandlerDecl {
        HandlerDecl::new("Kick")
            .controller::<ModController>()
            .param(ParamDecl::new("user", DeclaredType::of::<String>()))
            .param(
                ParamDecl::new("reason", DeclaredType::nullable::<String>())
                    .default("no reason given".to_string()),
            )
            .handler(|_| async { Ok(()) })
    }

    #[test]
    fn test_kick_arguments_and_range() {
        let command = Command::new(kick_decl(), None).unwrap();

        assert_eq!(command.name(), "Kick");
        assert_eq!(command.controller(), ControllerId::of::<ModController>());
        assert_eq!(command.arguments().len(), 2);
        assert!(!command.arguments()[0].is_optional());
        assert!(command.arguments()[1].is_optional());
        assert_eq!(command.optional_argument_count(), 1);
        assert_eq!(command.valid_argument_count(), (1, 2));
    }

    #[test]
    fn test_arguments_to_use() {
        let command = Command::new(kick_decl(), None).unwrap();

        let one = command.arguments_to_use(1).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].name(), "user");

        let two = command.arguments_to_use(2).unwrap();
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn test_argument_count_errors() {
        let command = Command::new(kick_decl(), None).unwrap();

        let too_few = command.arguments_to_use(0).unwrap_err();
        assert_eq!(too_few.kind, CountErrorKind::TooFew);
        assert_eq!(
            too_few.to_string(),
            "Not enough values provided to the Kick command; expected between 1 and 2, but got 0"
        );

        let too_many = command.arguments_to_use(3).unwrap_err();
        assert_eq!(too_many.kind, CountErrorKind::TooMany);
        assert_eq!((too_many.min, too_many.max, too_many.supplied), (1, 2, 3));
        assert!(too_many.to_string().starts_with("Too many values provided to the Kick command"));
    }

    #[test]
    fn test_range_for_every_suffix_length() {
        for total in 0..5usize {
            for optional in 0..=total {
                let mut decl = HandlerDecl::new("cmd").controller::<ModController>();
                for i in 0..total {
                    let ty = if i >= total - optional {
                        DeclaredType::nullable::<u8>()
                    } else {
                        DeclaredType::of::<u8>()
                    };
                    decl = decl.param(ParamDecl::new(format!("a{i}"), ty));
                }
                let command = Command::new(decl.handler(|_| async { Ok(()) }), None).unwrap();

                assert_eq!(command.valid_argument_count(), (total - optional, total));
                for count in 0..=total + 1 {
                    let accepted = count >= total - optional && count <= total;
                    assert_eq!(command.arguments_to_use(count).is_ok(), accepted);
                }
            }
        }
    }

    #[test]
    fn test_explicit_name_and_aliases_deduped() {
        let decl = kick_decl()
            .name("boot")
            .aliases(["k", "K", "BOOT", "remove"]);
        let command = Command::new(decl, None).unwrap();

        assert_eq!(command.name(), "boot");
        assert_eq!(command.aliases(), ["k".to_string(), "remove".to_string()]);
        assert!(command.is_identified_by("REMOVE"));
        assert!(command.is_identified_by("Boot"));
        assert!(!command.is_identified_by("Kick"));
    }

    #[test]
    fn test_controller_checks() {
        assert!(Command::new(kick_decl(), Some(ControllerId::of::<ModController>())).is_ok());

        let err = Command::new(kick_decl(), Some(ControllerId::of::<OtherController>())).unwrap_err();
        assert!(matches!(err, CommandError::ControllerMismatch { .. }));

        let orphan = HandlerDecl::new("orphan").handler(|_| async { Ok(()) });
        assert!(matches!(
            Command::new(orphan, None),
            Err(CommandError::UnknownController { .. })
        ));
    }

    #[test]
    fn test_generic_parameters_rejected() {
        let err = Command::new(kick_decl().generic_param("T"), None).unwrap_err();
        assert!(matches!(err, CommandError::GenericParameters { .. }));
        assert!(err.to_string().contains("ModController.Kick"));
    }

    #[test]
    fn test_missing_handler_rejected() {
        let decl = HandlerDecl::new("noop").controller::<ModController>();
        assert!(matches!(
            Command::new(decl, None),
            Err(CommandError::MissingHandler { .. })
        ));
    }

    #[test]
    fn test_required_after_optional_rejected() {
        let decl = HandlerDecl::new("warn")
            .controller::<ModController>()
            .param(ParamDecl::new("reason", DeclaredType::nullable::<String>()))
            .param(ParamDecl::new("user", DeclaredType::of::<String>()))
            .handler(|_| async { Ok(()) });

        assert_eq!(
            Command::new(decl, None).unwrap_err(),
            CommandError::RequiredAfterOptional {
                handler: "ModController.warn".to_string(),
                required: "user".to_string(),
                optional: "reason".to_string(),
            }
        );
    }

    #[test]
    fn test_invalid_parameter_wrapped() {
        let decl = kick_decl().param(ParamDecl::unnamed(DeclaredType::of::<u8>()));
        let err = Command::new(decl, None).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Argument {
                source: ArgumentError::MissingName { position: 2 },
                ..
            }
        ));
    }

    #[test]
    fn test_mistyped_default_wrapped() {
        let decl = kick_decl()
            .param(ParamDecl::new("days", DeclaredType::nullable::<u32>()).default("7"));
        let err = Command::new(decl, None).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Argument {
                source: ArgumentError::DefaultTypeMismatch { ref name, .. },
                ..
            } if name == "days"
        ));
    }

    #[test]
    fn test_duplicate_argument_rejected() {
        let decl = kick_decl().param(ParamDecl::new("user", DeclaredType::nullable::<String>()));
        assert!(matches!(
            Command::new(decl, None),
            Err(CommandError::DuplicateArgument { .. })
        ));
    }

    #[test]
    fn test_usage_and_info() {
        let decl = kick_decl()
            .alias("k")
            .description("Kick a user")
            .require(PermissionRequirement::all(vec!["kick"]));
        let command = Command::new(decl, None).unwrap();

        assert_eq!(command.usage(), "Kick <user> [reason]");
        assert_eq!(
            command.requirement().map(|r| r.mode()),
            Some(PermissionsMode::RequireAll)
        );

        let info = command.info();
        assert_eq!(info.controller, "ModController");
        assert_eq!((info.min_args, info.max_args), (1, 2));
        assert_eq!(info.arguments[1].value_type, "String");
        assert!(info.arguments[1].has_default);

        let json = serde_json::to_string(&info).unwrap();
        let decoded: CommandInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, info);
    }
}
