use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use herald::permission::FnPolicy;
use herald::{
    async_trait, BasicContext, CommandContext, CommandController, DispatchConfig, Dispatcher,
    HandlerDecl, Invocation, Messenger, MessengerError, PermissionsMode, Registry, TracingConfig,
    TracingFormat,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

// ============================================
// Command Line
// ============================================

#[derive(Parser, Debug)]
#[command(name = "console-bot", about = "Run herald commands typed on stdin")]
struct Cli {
    /// Name of the user typing the commands
    #[arg(long, env = "CONSOLE_BOT_USER", default_value = "guest")]
    user: String,

    /// User allowed to run moderation commands (repeatable)
    #[arg(long = "moderator", value_name = "USER")]
    moderators: Vec<String>,

    /// JSON file with dispatcher settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Command prefix, overriding the config file
    #[arg(long)]
    prefix: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormat> for TracingFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => TracingFormat::Pretty,
            LogFormat::Compact => TracingFormat::Compact,
            LogFormat::Json => TracingFormat::Json,
        }
    }
}

// ============================================
// Transport
// ============================================

/// Prints responses to stdout
struct StdoutMessenger;

#[async_trait]
impl Messenger for StdoutMessenger {
    async fn send(&self, context: &dyn CommandContext, message: &str) -> Result<(), MessengerError> {
        for line in message.lines() {
            println!("[bot -> {}] {}", context.user().display_name(), line);
        }
        Ok(())
    }
}

// ============================================
// Commands
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Perm {
    Kick,
    Announce,
}

/// Check that the bot is alive
#[herald::command]
async fn ping(invocation: Invocation) -> Result<(), MessengerError> {
    invocation.respond("pong").await
}

/// Repeat a message
#[herald::command(aliases = ["say"])]
async fn echo(invocation: Invocation, text: String) -> Result<(), MessengerError> {
    invocation.respond(&text).await
}

/// Roll a die (six sides unless told otherwise)
#[herald::command(aliases = ["dice"])]
async fn roll(invocation: Invocation, sides: Option<u32>) -> Result<(), MessengerError> {
    let sides = sides.unwrap_or(6).max(1);
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos())
        .unwrap_or_default();
    invocation
        .respond(&format!("rolled {} (d{sides})", seed % sides + 1))
        .await
}

/// Remove a user from the channel
#[herald::command(aliases = ["k"], require_all = [Perm::Kick])]
async fn kick(
    ctl: CommandController<Perm>,
    user: String,
    #[optional]
    #[default("no reason given".to_string())]
    reason: String,
) -> Result<(), MessengerError> {
    ctl.respond(&format!("{user} was kicked ({reason})")).await
}

/// Broadcast a message to the channel
#[herald::command(require_any = [Perm::Announce, Perm::Kick])]
async fn announce(ctl: CommandController<Perm>, text: String) -> Result<(), MessengerError> {
    let tag = if ctl.has_permission(&[Perm::Kick], PermissionsMode::RequireAll).await {
        "[mod]"
    } else {
        "[announce]"
    };
    ctl.respond(&format!("{tag} {text}")).await
}

fn help_command(registry: Registry) -> HandlerDecl {
    HandlerDecl::new("help")
        .alias("h")
        .controller::<Invocation>()
        .description("List the available commands")
        .handler(move |invocation: Invocation| {
            let registry = registry.clone();
            async move {
                let lines: Vec<String> = registry
                    .commands()
                    .iter()
                    .map(|command| {
                        let info = command.info();
                        match info.description {
                            Some(description) => format!("{} - {}", info.usage, description),
                            None => info.usage,
                        }
                    })
                    .collect();
                invocation.respond(&lines.join("\n")).await?;
                Ok(())
            }
        })
}

fn build_registry() -> anyhow::Result<Registry> {
    let registry = Registry::with_builtin_parsers();
    registry.register(help_command(registry.clone()))?;
    registry.register_controller::<Invocation>([ping_command(), echo_command(), roll_command()])?;
    registry.register_controller::<CommandController<Perm>>([kick_command(), announce_command()])?;
    Ok(registry)
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    herald::init_subscriber_with_config(TracingConfig {
        format: cli.log_format.into(),
        ..Default::default()
    })?;

    let mut config = match &cli.config {
        Some(path) => DispatchConfig::from_json_file(path)
            .with_context(|| format!("loading dispatcher config from {}", path.display()))?,
        None => DispatchConfig::default(),
    };
    if let Some(prefix) = cli.prefix {
        config.prefix = prefix;
    }

    let moderators = cli.moderators;
    let policy = FnPolicy(move |context: &dyn CommandContext, perm: &Perm| match perm {
        Perm::Kick => moderators.iter().any(|m| m == context.user().id()),
        Perm::Announce => context.user().id() != "guest",
    });

    let dispatcher = Dispatcher::new(build_registry()?, Arc::new(StdoutMessenger))
        .with_config(config)
        .with_policy::<Perm>(Arc::new(policy));

    info!(
        user = %cli.user,
        prefix = %dispatcher.config().prefix,
        commands = dispatcher.registry().len(),
        "Console bot started"
    );
    println!(
        "Logged in as {}. Type `{}help` for commands, Ctrl-D to quit.",
        cli.user,
        dispatcher.config().prefix
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let context = Arc::new(BasicContext::new(cli.user.clone(), line.clone()));
        match dispatcher.dispatch_line(&line, context).await {
            Ok(_) => {}
            // Already reported to the user by the dispatcher.
            Err(err) if err.is_usage_error() => {}
            Err(err) => error!(error = %err, exit_code = err.exit_code(), "Command failed"),
        }
    }

    Ok(())
}
