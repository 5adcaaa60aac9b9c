//! Command dispatch
//!
//! The [`Dispatcher`] resolves an identifier through the [`Registry`], checks
//! the command's permission requirement, parses the supplied values with the
//! registered parsers, fills defaults for omitted optional arguments and runs
//! the handler with the resulting [`Invocation`].

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::command::{ArgumentCountError, Command};
use crate::config::DispatchConfig;
use crate::context::CommandContext;
use crate::input::{split_input, InputError};
use crate::messenger::{Messenger, MessengerError};
use crate::parser::ParseError;
use crate::permission::{MissingPolicy, PermissionPolicy, PolicySet};
use crate::registry::{Registry, RegistryError};
use crate::value::{TypeTag, Value};

/// Future returned by a bound handler
pub type HandlerFuture = BoxFuture<'static, Result<(), DispatchError>>;

/// Type-erased handler binding
pub type HandlerFn = Arc<dyn Fn(Invocation) -> HandlerFuture + Send + Sync>;

// ============================================================================
// Error Types
// ============================================================================

/// Reading a parsed argument failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentAccessError {
    #[error("No argument at position {0}")]
    OutOfRange(usize),

    #[error("Argument '{name}' has no value")]
    Missing { name: String },

    #[error("Argument '{name}' holds a {actual}, not a {expected}")]
    WrongType {
        name: String,
        expected: String,
        actual: String,
    },
}

/// Error type for dispatching a command.
///
/// Usage errors (see [`DispatchError::is_usage_error`]) are the end user's
/// fault and are worth reporting back to them. Everything else points at the
/// embedding application: a missing parser or policy, or a failing handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    ArgumentCount(#[from] ArgumentCountError),

    #[error("Invalid value for argument '{argument}': {source}")]
    Parse {
        argument: String,
        #[source]
        source: ParseError,
    },

    #[error("You do not have permission to use the {command} command")]
    PermissionDenied { command: String },

    #[error(transparent)]
    MissingPolicy(#[from] MissingPolicy),

    #[error(transparent)]
    Argument(#[from] ArgumentAccessError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Messenger(#[from] MessengerError),

    #[error("Handler failed: {0}")]
    Handler(Box<dyn StdError + Send + Sync>),
}

impl DispatchError {
    /// Wrap a handler's own error.
    ///
    /// A boxed `DispatchError` is unwrapped instead of nested.
    pub fn handler(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        let boxed: Box<dyn StdError + Send + Sync> = error.into();
        match boxed.downcast::<DispatchError>() {
            Ok(inner) => *inner,
            Err(other) => DispatchError::Handler(other),
        }
    }

    /// Whether the error was caused by the end user's input
    pub fn is_usage_error(&self) -> bool {
        match self {
            DispatchError::Registry(err) => matches!(err, RegistryError::UnknownCommand(_)),
            DispatchError::ArgumentCount(_)
            | DispatchError::Parse { .. }
            | DispatchError::PermissionDenied { .. }
            | DispatchError::Input(_) => true,
            DispatchError::MissingPolicy(_)
            | DispatchError::Argument(_)
            | DispatchError::Messenger(_)
            | DispatchError::Handler(_) => false,
        }
    }

    /// Process exit code for transports that map errors to one:
    /// 1 for usage errors, 101 for everything else
    pub fn exit_code(&self) -> i32 {
        if self.is_usage_error() {
            1
        } else {
            101
        }
    }

    fn shows_usage(&self) -> bool {
        matches!(
            self,
            DispatchError::ArgumentCount(_) | DispatchError::Parse { .. }
        )
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// One resolved argument of an invocation
#[derive(Debug, Clone)]
pub struct ArgumentValue {
    name: String,
    value: Option<Value>,
    supplied: bool,
}

impl ArgumentValue {
    pub fn new(name: impl Into<String>, value: Option<Value>, supplied: bool) -> Self {
        Self {
            name: name.into(),
            value,
            supplied,
        }
    }

    /// Argument name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed or default value; `None` for an omitted optional without one
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Whether the user supplied the value
    pub fn was_supplied(&self) -> bool {
        self.supplied
    }
}

/// Resolved arguments, one per declared argument, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    entries: Vec<ArgumentValue>,
}

impl Arguments {
    pub fn new(entries: Vec<ArgumentValue>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Argument at `index`
    pub fn get(&self, index: usize) -> Option<&ArgumentValue> {
        self.entries.get(index)
    }

    /// Argument called `name`
    pub fn named(&self, name: &str) -> Option<&ArgumentValue> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Whether the argument at `index` was supplied by the user
    pub fn was_supplied(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|entry| entry.supplied)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArgumentValue> {
        self.entries.iter()
    }

    /// Value at `index`, which must be present
    pub fn required<T: Clone + 'static>(&self, index: usize) -> Result<T, ArgumentAccessError> {
        let entry = self.entry(index)?;
        match self.optional::<T>(index)? {
            Some(value) => Ok(value),
            None => Err(ArgumentAccessError::Missing {
                name: entry.name.clone(),
            }),
        }
    }

    /// Value at `index`, or `None` if the argument has no value
    pub fn optional<T: Clone + 'static>(&self, index: usize) -> Result<Option<T>, ArgumentAccessError> {
        let entry = self.entry(index)?;
        let Some(value) = &entry.value else {
            return Ok(None);
        };
        value
            .downcast_ref::<T>()
            .cloned()
            .map(Some)
            .ok_or_else(|| ArgumentAccessError::WrongType {
                name: entry.name.clone(),
                expected: TypeTag::of::<T>().short_name().to_string(),
                actual: value.tag().short_name().to_string(),
            })
    }

    fn entry(&self, index: usize) -> Result<&ArgumentValue, ArgumentAccessError> {
        self.entries
            .get(index)
            .ok_or(ArgumentAccessError::OutOfRange(index))
    }
}

// ============================================================================
// Invocation
// ============================================================================

/// Everything a handler receives for one command usage
#[derive(Clone)]
pub struct Invocation {
    command: Arc<Command>,
    context: Arc<dyn CommandContext>,
    messenger: Arc<dyn Messenger>,
    policies: Arc<PolicySet>,
    arguments: Arguments,
}

impl Invocation {
    pub fn new(
        command: Arc<Command>,
        context: Arc<dyn CommandContext>,
        messenger: Arc<dyn Messenger>,
        policies: Arc<PolicySet>,
        arguments: Arguments,
    ) -> Self {
        Self {
            command,
            context,
            messenger,
            policies,
            arguments,
        }
    }

    /// Command being run
    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// Context of the usage
    pub fn context(&self) -> &Arc<dyn CommandContext> {
        &self.context
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    /// Permission policies installed on the dispatcher
    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Send a message for this usage's context
    pub async fn respond(&self, message: &str) -> Result<(), MessengerError> {
        self.messenger.send(self.context.as_ref(), message).await
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.command.name())
            .field("user", &self.context.user().id())
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// Types a handler can build from its [`Invocation`] (controllers)
pub trait FromInvocation: Sized {
    fn from_invocation(invocation: &Invocation) -> Result<Self, DispatchError>;
}

impl FromInvocation for Invocation {
    fn from_invocation(invocation: &Invocation) -> Result<Self, DispatchError> {
        Ok(invocation.clone())
    }
}

/// Return types a handler function may have
pub trait IntoHandlerResult {
    fn into_handler_result(self) -> Result<(), DispatchError>;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> Result<(), DispatchError> {
        Ok(())
    }
}

impl<E> IntoHandlerResult for Result<(), E>
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    fn into_handler_result(self) -> Result<(), DispatchError> {
        self.map_err(DispatchError::handler)
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Outcome of [`Dispatcher::dispatch_line`]
#[derive(Debug, Clone)]
pub enum Dispatched {
    /// The handler of `command` ran to completion
    Completed { command: Arc<Command> },
    /// The line was not a command (no prefix)
    Ignored,
}

/// Runs commands from a [`Registry`]
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use herald::{BasicContext, DeclaredType, Dispatcher, HandlerDecl, MemoryMessenger, ParamDecl, Registry};
///
/// struct Greeter;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let registry = Registry::with_builtin_parsers();
/// registry
///     .register(
///         HandlerDecl::new("greet")
///             .controller::<Greeter>()
///             .param(ParamDecl::new("name", DeclaredType::of::<String>()))
///             .handler(|invocation| async move {
///                 let name: String = invocation.arguments().required(0)?;
///                 invocation.respond(&format!("Hello, {name}!")).await?;
///                 Ok(())
///             }),
///     )
///     .unwrap();
///
/// let messenger = Arc::new(MemoryMessenger::new());
/// let dispatcher = Dispatcher::new(registry, messenger.clone());
/// dispatcher
///     .dispatch_line("!greet Ada", Arc::new(BasicContext::new("u1", "!greet Ada")))
///     .await
///     .unwrap();
/// assert_eq!(messenger.texts(), vec!["Hello, Ada!"]);
/// # });
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    registry: Registry,
    messenger: Arc<dyn Messenger>,
    policies: Arc<PolicySet>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(registry: Registry, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            registry,
            messenger,
            policies: Arc::new(PolicySet::new()),
            config: DispatchConfig::default(),
        }
    }

    /// Install the policy deciding permissions of type `P`
    pub fn with_policy<P: 'static>(mut self, policy: Arc<dyn PermissionPolicy<P>>) -> Self {
        Arc::make_mut(&mut self.policies).insert::<P>(policy);
        self
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn policies(&self) -> &PolicySet {
        &self.policies
    }

    /// Run the command identified by `id` with raw `values`
    pub async fn dispatch<S>(
        &self,
        id: &str,
        values: &[S],
        context: Arc<dyn CommandContext>,
    ) -> Result<(), DispatchError>
    where
        S: AsRef<str> + Sync,
    {
        self.dispatch_command(id, values, context).await.map(|_| ())
    }

    /// Tokenize `line` and run the command it names
    pub async fn dispatch_line(
        &self,
        line: &str,
        context: Arc<dyn CommandContext>,
    ) -> Result<Dispatched, DispatchError> {
        let raw = match split_input(line, &self.config) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(Dispatched::Ignored),
            Err(err) => return Err(self.report(None, context.as_ref(), err.into()).await),
        };

        let command = self
            .dispatch_command(&raw.command, raw.values.as_slice(), context)
            .await?;
        Ok(Dispatched::Completed { command })
    }

    async fn dispatch_command<S>(
        &self,
        id: &str,
        values: &[S],
        context: Arc<dyn CommandContext>,
    ) -> Result<Arc<Command>, DispatchError>
    where
        S: AsRef<str> + Sync,
    {
        let command = match self.registry.expect_command(id) {
            Ok(command) => command,
            Err(err) => return Err(self.report(None, context.as_ref(), err.into()).await),
        };

        match self.run(&command, values, Arc::clone(&context)).await {
            Ok(()) => {
                tracing::info!(
                    command = %command.name(),
                    user = %context.user().id(),
                    "Command completed"
                );
                Ok(command)
            }
            Err(err) => Err(self.report(Some(&command), context.as_ref(), err).await),
        }
    }

    async fn run<S>(
        &self,
        command: &Arc<Command>,
        values: &[S],
        context: Arc<dyn CommandContext>,
    ) -> Result<(), DispatchError>
    where
        S: AsRef<str> + Sync,
    {
        if let Some(requirement) = command.requirement() {
            let granted = requirement.check(&self.policies, context.as_ref()).await?;
            tracing::debug!(
                command = %command.name(),
                mode = ?requirement.mode(),
                granted,
                "Permission requirement checked"
            );
            if !granted {
                return Err(DispatchError::PermissionDenied {
                    command: command.name().to_string(),
                });
            }
        }

        let to_use = command.arguments_to_use(values.len())?;
        let mut entries = Vec::with_capacity(command.arguments().len());

        for (argument, raw) in to_use.iter().zip(values) {
            let parser = self
                .registry
                .expect_argument_parser(argument.value_type())?;
            let value = parser
                .parse(raw.as_ref(), context.as_ref())
                .await
                .map_err(|source| DispatchError::Parse {
                    argument: argument.name().to_string(),
                    source,
                })?;

            if value.tag() != argument.value_type() {
                return Err(RegistryError::ParserMismatch {
                    tag: argument.value_type(),
                    target: value.tag(),
                }
                .into());
            }

            tracing::debug!(argument = %argument.name(), value_type = %value.tag(), "Argument parsed");
            entries.push(ArgumentValue::new(argument.name(), Some(value), true));
        }

        for argument in &command.arguments()[to_use.len()..] {
            entries.push(ArgumentValue::new(
                argument.name(),
                argument.default_value().cloned(),
                false,
            ));
        }

        let invocation = Invocation::new(
            Arc::clone(command),
            context,
            Arc::clone(&self.messenger),
            Arc::clone(&self.policies),
            Arguments::new(entries),
        );
        (command.handler())(invocation).await
    }

    /// Log a failed dispatch and, for usage errors, tell the user
    async fn report(
        &self,
        command: Option<&Command>,
        context: &dyn CommandContext,
        err: DispatchError,
    ) -> DispatchError {
        let name = command.map(Command::name).unwrap_or_default();

        if !err.is_usage_error() {
            tracing::error!(command = %name, error = %err, "Command failed");
            return err;
        }

        tracing::warn!(command = %name, user = %context.user().id(), error = %err, "Usage error");
        if !self.config.respond_to_usage_errors {
            return err;
        }

        let mut message = err.to_string();
        if let Some(command) = command.filter(|_| err.shows_usage()) {
            message.push_str(&format!("\nUsage: {}{}", self.config.prefix, command.usage()));
        }
        if let Err(send_err) = self.messenger.send(context, &message).await {
            tracing::warn!(error = %send_err, "Failed to report usage error");
        }
        err
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("policies", &self.policies)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argument::ParamDecl;
    use crate::command::HandlerDecl;
    use crate::context::BasicContext;
    use crate::messenger::MemoryMessenger;
    use crate::permission::{AllowAllPolicy, DenyAllPolicy, PermissionRequirement};
    use crate::value::DeclaredType;
    use std::sync::Mutex;

    struct ModController;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Perm {
        Kick,
    }

    type Seen = Arc<Mutex<Vec<(String, Option<String>, bool)>>>;

    fn kick_decl(seen: Seen) -> HandlerDecl {
        HandlerDecl::new("kick")
            .alias("k")
            .controller::<ModController>()
            .param(ParamDecl::new("user", DeclaredType::of::<String>()))
            .param(
                ParamDecl::new("reason", DeclaredType::nullable::<String>())
                    .default("no reason given".to_string()),
            )
            .handler(move |invocation: Invocation| {
                let seen = Arc::clone(&seen);
                async move {
                    let args = invocation.arguments();
                    let user: String = args.required(0)?;
                    let reason: Option<String> = args.optional(1)?;
                    seen.lock().unwrap().push((user, reason, args.was_supplied(1)));
                    Ok(())
                }
            })
    }

    fn setup() -> (Dispatcher, Arc<MemoryMessenger>, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let registry = Registry::with_builtin_parsers();
        registry.register(kick_decl(Arc::clone(&seen))).unwrap();

        let messenger = Arc::new(MemoryMessenger::new());
        let dispatcher = Dispatcher::new(registry, messenger.clone());
        (dispatcher, messenger, seen)
    }

    fn ctx() -> Arc<dyn CommandContext> {
        Arc::new(BasicContext::new("mod-1", ""))
    }

    #[tokio::test]
    async fn test_dispatch_fills_default() {
        let (dispatcher, _, seen) = setup();

        dispatcher.dispatch("kick", &["bob"], ctx()).await.unwrap();
        dispatcher
            .dispatch("K", &["eve", "spam"], ctx())
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("bob".to_string(), Some("no reason given".to_string()), false),
                ("eve".to_string(), Some("spam".to_string()), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_count_error_reports_usage() {
        let (dispatcher, messenger, seen) = setup();

        let err = dispatcher
            .dispatch("kick", &["a", "b", "c"], ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ArgumentCount(_)));
        assert!(err.is_usage_error());
        assert_eq!(err.exit_code(), 1);

        let texts = messenger.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Too many values provided to the kick command"));
        assert!(texts[0].ends_with("Usage: !kick <user> [reason]"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (dispatcher, messenger, _) = setup();

        let err = dispatcher
            .dispatch("ban", &["bob"], ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Registry(RegistryError::UnknownCommand(ref id)) if id == "ban"
        ));
        assert_eq!(messenger.texts(), vec!["No registered command with \"ban\" identifier"]);
    }

    #[tokio::test]
    async fn test_usage_responses_disabled() {
        let (dispatcher, messenger, _) = setup();
        let dispatcher =
            dispatcher.with_config(DispatchConfig::default().with_usage_responses(false));

        assert!(dispatcher.dispatch::<&str>("kick", &[], ctx()).await.is_err());
        assert!(messenger.texts().is_empty());
    }

    #[tokio::test]
    async fn test_parse_error() {
        let registry = Registry::with_builtin_parsers();
        registry
            .register(
                HandlerDecl::new("mute")
                    .controller::<ModController>()
                    .param(ParamDecl::new("minutes", DeclaredType::of::<u32>()))
                    .handler(|_| async { Ok(()) }),
            )
            .unwrap();
        let messenger = Arc::new(MemoryMessenger::new());
        let dispatcher = Dispatcher::new(registry, messenger.clone());

        let err = dispatcher
            .dispatch("mute", &["ten"], ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Parse { ref argument, .. } if argument == "minutes"));
        assert!(messenger.texts()[0].contains("Usage: !mute <minutes>"));
    }

    #[tokio::test]
    async fn test_missing_parser_is_not_usage_error() {
        struct Duration;

        let registry = Registry::new();
        registry
            .register(
                HandlerDecl::new("slow")
                    .controller::<ModController>()
                    .param(ParamDecl::new("delay", DeclaredType::of::<Duration>()))
                    .handler(|_| async { Ok(()) }),
            )
            .unwrap();
        let messenger = Arc::new(MemoryMessenger::new());
        let dispatcher = Dispatcher::new(registry, messenger.clone());

        let err = dispatcher
            .dispatch("slow", &["5"], ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Registry(RegistryError::UnknownParser(_))));
        assert!(!err.is_usage_error());
        assert_eq!(err.exit_code(), 101);
        assert!(messenger.texts().is_empty());
    }

    fn guarded(registry: &Registry, ran: Arc<Mutex<bool>>) {
        registry
            .register(
                HandlerDecl::new("purge")
                    .controller::<ModController>()
                    .require(PermissionRequirement::all(vec![Perm::Kick]))
                    .handler(move |_| {
                        let ran = Arc::clone(&ran);
                        async move {
                            *ran.lock().unwrap() = true;
                            Ok(())
                        }
                    }),
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_permission_requirement_blocks_handler() {
        let ran = Arc::new(Mutex::new(false));
        let registry = Registry::new();
        guarded(&registry, Arc::clone(&ran));

        let messenger = Arc::new(MemoryMessenger::new());
        let denied = Dispatcher::new(registry.clone(), messenger.clone())
            .with_policy::<Perm>(Arc::new(DenyAllPolicy));
        let err = denied.dispatch::<&str>("purge", &[], ctx()).await.unwrap_err();
        assert!(matches!(err, DispatchError::PermissionDenied { .. }));
        assert!(!*ran.lock().unwrap());
        assert_eq!(
            messenger.texts(),
            vec!["You do not have permission to use the purge command"]
        );

        let allowed = Dispatcher::new(registry, messenger.clone())
            .with_policy::<Perm>(Arc::new(AllowAllPolicy));
        allowed.dispatch::<&str>("purge", &[], ctx()).await.unwrap();
        assert!(*ran.lock().unwrap());
    }

    #[tokio::test]
    async fn test_missing_policy() {
        let registry = Registry::new();
        guarded(&registry, Arc::new(Mutex::new(false)));
        let dispatcher = Dispatcher::new(registry, Arc::new(MemoryMessenger::new()));

        let err = dispatcher.dispatch::<&str>("purge", &[], ctx()).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingPolicy(_)));
        assert!(!err.is_usage_error());
    }

    #[tokio::test]
    async fn test_dispatch_line() {
        let (dispatcher, _, seen) = setup();

        match dispatcher
            .dispatch_line(r#"!kick bob "flooding chat""#, ctx())
            .await
            .unwrap()
        {
            Dispatched::Completed { command } => assert_eq!(command.name(), "kick"),
            Dispatched::Ignored => panic!("line should have been dispatched"),
        }
        assert!(matches!(
            dispatcher.dispatch_line("just chatting", ctx()).await.unwrap(),
            Dispatched::Ignored
        ));
        assert!(matches!(
            dispatcher.dispatch_line("!kick \"bob", ctx()).await.unwrap_err(),
            DispatchError::Input(InputError::UnterminatedQuote { .. })
        ));

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1.as_deref(), Some("flooding chat"));
    }

    #[tokio::test]
    async fn test_handler_errors() {
        let registry = Registry::new();
        registry
            .register(
                HandlerDecl::new("fail")
                    .controller::<ModController>()
                    .handler(|_| async {
                        Err(DispatchError::handler(std::io::Error::other("disk full")))
                    }),
            )
            .unwrap();
        let dispatcher = Dispatcher::new(registry, Arc::new(MemoryMessenger::new()));

        let err = dispatcher.dispatch::<&str>("fail", &[], ctx()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
        assert_eq!(err.to_string(), "Handler failed: disk full");
    }

    #[test]
    fn test_handler_error_unwraps_dispatch_error() {
        let inner = DispatchError::PermissionDenied {
            command: "kick".to_string(),
        };
        assert!(matches!(
            DispatchError::handler(inner),
            DispatchError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn test_into_handler_result() {
        assert!(().into_handler_result().is_ok());
        assert!(Ok::<(), std::io::Error>(()).into_handler_result().is_ok());

        let err = Err::<(), _>("boom").into_handler_result().unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
    }

    #[test]
    fn test_argument_access() {
        let args = Arguments::new(vec![
            ArgumentValue::new("user", Some(Value::new("bob".to_string())), true),
            ArgumentValue::new("count", Some(Value::new(3u8)), true),
            ArgumentValue::new("reason", None, false),
        ]);

        assert_eq!(args.required::<String>(0).unwrap(), "bob");
        assert_eq!(args.optional::<u8>(1).unwrap(), Some(3));
        assert_eq!(args.optional::<String>(2).unwrap(), None);
        assert_eq!(
            args.required::<String>(2).unwrap_err(),
            ArgumentAccessError::Missing { name: "reason".to_string() }
        );
        assert_eq!(
            args.required::<String>(1).unwrap_err(),
            ArgumentAccessError::WrongType {
                name: "count".to_string(),
                expected: "String".to_string(),
                actual: "u8".to_string(),
            }
        );
        assert_eq!(
            args.required::<String>(7).unwrap_err(),
            ArgumentAccessError::OutOfRange(7)
        );
        assert_eq!(args.named("count").map(|a| a.was_supplied()), Some(true));
        assert!(!args.was_supplied(2));
    }
}
