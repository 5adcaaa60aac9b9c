//! # herald: command dispatch for chat bots and consoles
//!
//! Declare handlers once, register them under case-insensitive names and
//! aliases, and let the dispatcher turn raw string values into typed
//! arguments before running the handler.
//!
//! ## Core Pieces
//!
//! - [`HandlerDecl`] / [`ParamDecl`]: handler tables as data, written by hand
//!   or generated by the [`command`] attribute
//! - [`Command`]: a validated declaration with its argument-count range
//! - [`Registry`]: identifiers to commands, value types to parsers
//! - [`Dispatcher`]: permission check, parsing, defaults, handler call
//! - [`CommandController`]: permission helpers and `respond` for handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use herald::permission::AllowAllPolicy;
//! use herald::{command, BasicContext, CommandController, Dispatcher, MemoryMessenger, Registry};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Perm {
//!     Kick,
//! }
//!
//! /// Remove a user from the channel
//! #[command(aliases = ["k"], require_all = [Perm::Kick])]
//! async fn kick(
//!     ctl: CommandController<Perm>,
//!     user: String,
//!     reason: Option<String>,
//! ) -> Result<(), herald::MessengerError> {
//!     let reason = reason.unwrap_or_else(|| "no reason given".to_string());
//!     ctl.respond(&format!("Kicked {user}: {reason}")).await
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = Registry::with_builtin_parsers();
//! registry.register(kick_command()).unwrap();
//!
//! let messenger = Arc::new(MemoryMessenger::new());
//! let dispatcher = Dispatcher::new(registry, messenger.clone())
//!     .with_policy::<Perm>(Arc::new(AllowAllPolicy));
//!
//! let context = Arc::new(BasicContext::new("mod-1", "!k bob"));
//! dispatcher.dispatch_line("!k bob", context).await.unwrap();
//! assert_eq!(messenger.texts(), vec!["Kicked bob: no reason given"]);
//! # });
//! ```

pub mod argument;
pub mod command;
pub mod config;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod input;
pub mod messenger;
pub mod parser;
pub mod permission;
pub mod registry;
#[cfg(feature = "subscriber")]
pub mod tracing_support;
pub mod value;

pub use async_trait::async_trait;
pub use herald_macros::command;

pub use argument::{Argument, ArgumentError, Nullability, ParamDecl, ParamKind};
pub use command::{
    ArgumentCountError, ArgumentInfo, Command, CommandError, CommandInfo, ControllerId,
    CountErrorKind, HandlerDecl,
};
pub use config::{ConfigError, DispatchConfig};
pub use context::{BasicContext, BasicUser, CommandContext, TextTrigger, Trigger, User};
pub use controller::CommandController;
pub use dispatch::{
    ArgumentAccessError, ArgumentValue, Arguments, DispatchError, Dispatched, Dispatcher,
    FromInvocation, HandlerFn, HandlerFuture, IntoHandlerResult, Invocation,
};
pub use input::{split_input, InputError, RawInvocation};
pub use messenger::{MemoryMessenger, Messenger, MessengerError, NullMessenger, SentMessage};
pub use parser::{ArgumentParser, FnParser, FromStrParser, ParseError, TypedParser, ValueParser};
pub use permission::{
    evaluate_permissions, PermissionPolicy, PermissionRequirement, PermissionsMode, PolicySet,
};
pub use registry::{RegistrationError, Registry, RegistryError};
pub use value::{DeclaredType, TypeTag, Value};

#[cfg(feature = "subscriber")]
pub use tracing_support::{init_subscriber, init_subscriber_with_config, TracingConfig, TracingFormat};
