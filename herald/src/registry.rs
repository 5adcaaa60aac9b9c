//! Command and parser registry
//!
//! Provides a thread-safe catalog mapping identifiers (command names and
//! aliases, case-insensitive) to commands, and value types to parser bindings.
//! Lookups take a shared lock; registration takes the exclusive lock for the
//! whole check-then-insert, so a failed registration never leaves part of a
//! command behind.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::command::{normalize, Command, CommandError, ControllerId, HandlerDecl};
use crate::parser::{builtin_parsers, ArgumentParser, TypedParser, ValueParser};
use crate::value::TypeTag;

/// Errors that can occur during registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Identifier \"{identifier}\" is already registered to the {existing} command")]
    DuplicateIdentifier { identifier: String, existing: String },

    #[error("No registered command with \"{0}\" identifier")]
    UnknownCommand(String),

    #[error("An argument parser is already registered for type {0}")]
    DuplicateParser(TypeTag),

    #[error("No registered argument parser for type {0}")]
    UnknownParser(TypeTag),

    #[error("Parser producing {target} cannot be registered for type {tag}")]
    ParserMismatch { tag: TypeTag, target: TypeTag },
}

/// Failure to build and register a command in one step
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A thread-safe catalog of commands and argument parsers
///
/// Cloning is cheap and every clone shares the same catalog.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    /// Commands indexed by every case-folded identifier
    commands: HashMap<String, Arc<Command>>,
    /// Parser bindings indexed by the type they produce
    parsers: HashMap<TypeTag, Arc<dyn ArgumentParser>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with [`builtin_parsers`] already registered
    pub fn with_builtin_parsers() -> Self {
        let registry = Self::new();
        {
            let mut inner = registry.write();
            for parser in builtin_parsers() {
                inner.parsers.insert(parser.target(), parser);
            }
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Register a command under its name and every alias.
    ///
    /// Fails without inserting anything if any identifier is taken.
    pub fn register_command(
        &self,
        command: impl Into<Arc<Command>>,
    ) -> Result<Arc<Command>, RegistryError> {
        let command = command.into();
        let keys: Vec<String> = command.identifiers().map(normalize).collect();

        let mut inner = self.write();
        if let Some((key, existing)) = keys
            .iter()
            .find_map(|key| inner.commands.get(key).map(|existing| (key, existing)))
        {
            return Err(RegistryError::DuplicateIdentifier {
                identifier: key.clone(),
                existing: existing.name().to_string(),
            });
        }

        for key in keys {
            inner.commands.insert(key, Arc::clone(&command));
        }

        tracing::info!(
            command = %command.name(),
            aliases = ?command.aliases(),
            controller = %command.controller().name(),
            "Command registered"
        );
        Ok(command)
    }

    /// Build a command from its declaration and register it
    pub fn register(&self, decl: HandlerDecl) -> Result<Arc<Command>, RegistrationError> {
        let command = Command::new(decl, None)?;
        Ok(self.register_command(command)?)
    }

    /// Build commands for a controller's handler table and register them all.
    ///
    /// Every declaration must belong to `C`. Stops at the first failure;
    /// commands registered before it stay registered.
    pub fn register_controller<C: 'static>(
        &self,
        decls: impl IntoIterator<Item = HandlerDecl>,
    ) -> Result<Vec<Arc<Command>>, RegistrationError> {
        let controller = ControllerId::of::<C>();
        decls
            .into_iter()
            .map(|decl| {
                let command = Command::new(decl, Some(controller))?;
                Ok(self.register_command(command)?)
            })
            .collect()
    }

    /// Unregister a command and all of its aliases.
    ///
    /// Fails if the command's name is not registered to this exact instance.
    pub fn unregister_command(&self, command: &Command) -> Result<(), RegistryError> {
        let mut inner = self.write();
        match inner.commands.get(&normalize(command.name())) {
            Some(existing) if std::ptr::eq(existing.as_ref(), command) => {}
            _ => return Err(RegistryError::UnknownCommand(command.name().to_string())),
        }

        Self::remove_identifiers(&mut inner, command);
        tracing::info!(command = %command.name(), "Command unregistered");
        Ok(())
    }

    /// Unregister the command any of whose identifiers is `id`, returning it
    pub fn unregister_command_by_id(&self, id: &str) -> Result<Arc<Command>, RegistryError> {
        let mut inner = self.write();
        let command = inner
            .commands
            .get(&normalize(id))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownCommand(id.to_string()))?;

        Self::remove_identifiers(&mut inner, &command);
        tracing::info!(command = %command.name(), id = %id, "Command unregistered");
        Ok(command)
    }

    fn remove_identifiers(inner: &mut RegistryInner, command: &Command) {
        for id in command.identifiers() {
            inner.commands.remove(&normalize(id));
        }
    }

    /// Look up a command by any of its identifiers, ignoring case
    pub fn get_command(&self, id: &str) -> Option<Arc<Command>> {
        self.read().commands.get(&normalize(id)).cloned()
    }

    /// Look up a command, failing with [`RegistryError::UnknownCommand`]
    pub fn expect_command(&self, id: &str) -> Result<Arc<Command>, RegistryError> {
        self.get_command(id)
            .ok_or_else(|| RegistryError::UnknownCommand(id.to_string()))
    }

    /// Whether any command answers to `id`
    pub fn contains_command(&self, id: &str) -> bool {
        self.read().commands.contains_key(&normalize(id))
    }

    /// Distinct registered commands, sorted by name
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let inner = self.read();
        let mut commands = distinct(&inner.commands);
        commands.sort_by(|a, b| normalize(a.name()).cmp(&normalize(b.name())));
        commands
    }

    /// Every registered identifier (case-folded), sorted
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().commands.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of distinct registered commands
    pub fn len(&self) -> usize {
        distinct(&self.read().commands).len()
    }

    /// Whether no command is registered
    pub fn is_empty(&self) -> bool {
        self.read().commands.is_empty()
    }

    // ========================================================================
    // Argument Parsers
    // ========================================================================

    /// Bind `parser` to `tag`.
    ///
    /// Fails if a parser is already bound to `tag`, or if the parser produces
    /// a different type.
    pub fn register_argument_parser(
        &self,
        tag: TypeTag,
        parser: Arc<dyn ArgumentParser>,
    ) -> Result<(), RegistryError> {
        if parser.target() != tag {
            return Err(RegistryError::ParserMismatch {
                tag,
                target: parser.target(),
            });
        }

        let mut inner = self.write();
        if inner.parsers.contains_key(&tag) {
            return Err(RegistryError::DuplicateParser(tag));
        }
        inner.parsers.insert(tag, parser);

        tracing::debug!(value_type = %tag, "Argument parser registered");
        Ok(())
    }

    /// Register a typed parser for `T`, returning the stored binding
    pub fn register_parser<T, P>(&self, parser: P) -> Result<Arc<dyn ArgumentParser>, RegistryError>
    where
        T: Send + Sync + 'static,
        P: ValueParser<T> + 'static,
    {
        let binding: Arc<dyn ArgumentParser> = Arc::new(TypedParser::<T, P>::new(parser));
        self.register_argument_parser(TypeTag::of::<T>(), Arc::clone(&binding))?;
        Ok(binding)
    }

    /// Remove the parser bound to `tag`, returning it
    pub fn unregister_argument_parser(
        &self,
        tag: TypeTag,
    ) -> Result<Arc<dyn ArgumentParser>, RegistryError> {
        let parser = self
            .write()
            .parsers
            .remove(&tag)
            .ok_or(RegistryError::UnknownParser(tag))?;

        tracing::debug!(value_type = %tag, "Argument parser unregistered");
        Ok(parser)
    }

    /// Parser bound to `tag`, if any
    pub fn get_argument_parser(&self, tag: TypeTag) -> Option<Arc<dyn ArgumentParser>> {
        self.read().parsers.get(&tag).cloned()
    }

    /// Parser bound to `tag`, failing with [`RegistryError::UnknownParser`]
    pub fn expect_argument_parser(
        &self,
        tag: TypeTag,
    ) -> Result<Arc<dyn ArgumentParser>, RegistryError> {
        self.get_argument_parser(tag)
            .ok_or(RegistryError::UnknownParser(tag))
    }

    /// Types with a bound parser
    pub fn parser_types(&self) -> Vec<TypeTag> {
        self.read().parsers.keys().copied().collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("Registry")
            .field("identifiers", &inner.commands.len())
            .field("parsers", &inner.parsers.len())
            .finish()
    }
}

/// Each command once, however many identifiers point at it.
fn distinct(commands: &HashMap<String, Arc<Command>>) -> Vec<Arc<Command>> {
    let mut seen = HashSet::with_capacity(commands.len());
    commands
        .values()
        .filter(|command| seen.insert(Arc::as_ptr(*command)))
        .cloned()
        .collect()
}
