mod server;
mod settle;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use cv_core::{Entry, Role, Trigger, TriggerOutcome, VariableTracker};
use cv_store::{ChatSession, Settings};
use rmcp::{ServiceExt, transport::stdio};

use crate::settle::Settle;

#[derive(Parser)]
#[command(name = "cv", about = "Chat variable tracker CLI and MCP server")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Create a chat and make it active
    New {
        /// Chat name
        name: String,
    },

    /// Make an existing chat active
    Switch {
        /// Chat name
        name: String,
    },

    /// List chats
    Chats,

    /// Append a message to the active chat
    Append {
        /// Message text
        text: String,

        /// Author of the message
        #[arg(long, value_enum, default_value_t = Author::Assistant)]
        role: Author,
    },

    /// Replace the text of a message in the active chat
    Edit {
        /// Zero-based message index
        index: usize,
        /// Replacement text
        text: String,
    },

    /// Print the active chat's messages
    Show,

    /// Print the current variables
    Vars,

    /// Import a JSONL chat log and make it active
    Import {
        /// Input file path
        path: PathBuf,

        /// Chat name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Export the active chat as a JSONL chat log
    Export {
        /// Output file path
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Author {
    Assistant,
    User,
}

impl From<Author> for Role {
    fn from(author: Author) -> Self {
        match author {
            Author::Assistant => Role::Assistant,
            Author::User => Role::User,
        }
    }
}

/// Opened session, tracker and settings for one command.
struct App {
    session: ChatSession,
    tracker: VariableTracker,
    settings: Settings,
}

impl App {
    fn open() -> Result<Self> {
        let base = base_dir();
        let settings = Settings::load_from_dir(&base);
        let session = ChatSession::open(&base).context("failed to open chat store")?;
        Ok(Self {
            session,
            tracker: VariableTracker::new(),
            settings,
        })
    }

    /// Run `trigger` after the settling delay.
    async fn dispatch(&mut self, trigger: Trigger) -> TriggerOutcome {
        let settle = Settle::new(self.settings.settle_delay());
        tracing::debug!("{trigger}: settling for {:?}", settle.delay());
        let Self {
            session, tracker, ..
        } = self;
        settle.run(|| tracker.handle(trigger, session)).await
    }

    fn display(&self) -> String {
        self.tracker.display(&self.settings.empty_placeholder)
    }
}

fn base_dir() -> PathBuf {
    std::env::var("CV_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(cv_store::default_base_dir)
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve().await,
        Commands::New { name } => cmd_new(name).await,
        Commands::Switch { name } => cmd_switch(name).await,
        Commands::Chats => cmd_chats(),
        Commands::Append { text, role } => cmd_append(text, (*role).into()).await,
        Commands::Edit { index, text } => cmd_edit(*index, text).await,
        Commands::Show => cmd_show(),
        Commands::Vars => cmd_vars(),
        Commands::Import { path, name } => cmd_import(path, name.as_deref()).await,
        Commands::Export { path } => cmd_export(path),
    }
}

async fn cmd_serve() -> Result<()> {
    let app = App::open()?;
    tracing::info!(
        "starting MCP server (chat: {})",
        app.session.chat_name().unwrap_or("none")
    );

    let server = server::CvServer::new(app.session, &app.settings);
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;
    Ok(())
}

async fn cmd_new(name: &str) -> Result<()> {
    let mut app = App::open()?;
    if app.session.store().find_chat(name)?.is_some() {
        bail!("chat '{name}' already exists");
    }
    app.session
        .switch_chat(name, true)
        .with_context(|| format!("failed to create chat '{name}'"))?;
    app.dispatch(Trigger::TranscriptSwitched).await;

    println!("created chat '{name}'");
    Ok(())
}

async fn cmd_switch(name: &str) -> Result<()> {
    let mut app = App::open()?;
    app.session
        .switch_chat(name, false)
        .with_context(|| format!("failed to switch to chat '{name}'"))?;
    app.dispatch(Trigger::TranscriptSwitched).await;

    println!("switched to '{name}' ({} messages)", app.session.entries().len());
    println!("{}", app.display());
    Ok(())
}

fn cmd_chats() -> Result<()> {
    let app = App::open()?;
    let chats = app
        .session
        .store()
        .list_chats()
        .context("failed to list chats")?;

    if chats.is_empty() {
        println!("(no chats)");
        return Ok(());
    }
    let active = app.session.chat_name();
    for chat in chats {
        let marker = if Some(chat.name.as_str()) == active { '*' } else { ' ' };
        println!("{marker} {}  ({} messages)", chat.name, chat.messages);
    }
    Ok(())
}

async fn cmd_append(text: &str, role: Role) -> Result<()> {
    let mut app = App::open()?;
    let index = app
        .session
        .append(Entry::new(role, text))
        .context("failed to append message")?;
    let outcome = app.dispatch(Trigger::EntryReceived).await;

    let entry = &app.session.entries()[index];
    println!("[{index}] {}: {}", entry.role, entry.text);
    if outcome.refreshed {
        println!("(substituted {} values)", outcome.substitutions);
    }
    println!("{}", app.display());
    Ok(())
}

async fn cmd_edit(index: usize, text: &str) -> Result<()> {
    let mut app = App::open()?;
    app.session
        .edit(index, text)
        .with_context(|| format!("failed to edit message {index}"))?;
    app.dispatch(Trigger::EntryEdited).await;

    println!("edited message {index}");
    println!("{}", app.display());
    Ok(())
}

fn cmd_show() -> Result<()> {
    let app = App::open()?;
    let Some(name) = app.session.chat_name() else {
        bail!("no active chat");
    };

    println!("chat: {name}");
    if app.session.entries().is_empty() {
        println!("(empty chat)");
    }
    for (i, entry) in app.session.entries().iter().enumerate() {
        println!("[{i}] {}: {}", entry.role, entry.text);
    }
    Ok(())
}

fn cmd_vars() -> Result<()> {
    let mut app = App::open()?;
    app.tracker.recompute(app.session.entries());
    println!("{}", app.display());
    Ok(())
}

async fn cmd_import(path: &Path, name: Option<&str>) -> Result<()> {
    let mut app = App::open()?;
    let count = app
        .session
        .import_jsonl_file(path, name)
        .with_context(|| format!("failed to import {}", path.display()))?;
    app.dispatch(Trigger::TranscriptLoaded).await;

    println!(
        "imported {count} messages into '{}'",
        app.session.chat_name().unwrap_or_default()
    );
    println!("{}", app.display());
    Ok(())
}

fn cmd_export(path: &Path) -> Result<()> {
    let app = App::open()?;
    app.session
        .export_jsonl_file(path)
        .with_context(|| format!("failed to export to {}", path.display()))?;

    println!("exported to {}", path.display());
    Ok(())
}
