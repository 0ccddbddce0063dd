//! cli
//!
//! Process-facing layer: arguments, logging, stdin, and session startup.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and resolve them against configuration
//! - Open the codebase and load (or create) the starting branch
//! - Start the keystroke reader, watchers and debouncer
//! - Hand control to the [`crate::engine::Dispatcher`]
//!
//! The CLI layer is thin; everything that changes a branch lives in
//! [`crate::engine`].

pub mod args;
pub mod logging;
pub mod reader;

pub use args::Cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::core::branch::Branch;
use crate::core::config::Config;
use crate::core::types::BranchName;
use crate::engine::{self, reconcile_and_write, Dispatcher, Session};
use crate::frontend::{DeclarationFrontend, RuntimeHandle, SummaryRuntime};
use crate::queue::{LineBuffer, TQueue};
use crate::store::{BranchStore, FileBranchStore};
use crate::ui::output::{Console, Verbosity};
use crate::watch::{run_debouncer, watch_branch_files, watch_sources};

/// Settings after applying defaults, config files and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub codebase: PathBuf,
    pub branch: BranchName,
    pub source_dir: PathBuf,
    pub source_suffix: String,
    pub debounce: Duration,
    pub interactive: bool,
}

impl Settings {
    /// Resolve flags over configuration. Flags win.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch name is invalid.
    pub fn resolve(cli: &Cli, config: &Config, stdin_is_terminal: bool) -> Result<Self> {
        let raw_branch = cli.branch.as_deref().unwrap_or(config.default_branch());
        let branch = BranchName::new(raw_branch)
            .with_context(|| format!("Invalid branch name '{raw_branch}'"))?;

        Ok(Self {
            codebase: cli.codebase.clone(),
            branch,
            source_dir: cli.source_dir.clone().unwrap_or_else(|| config.source_dir()),
            source_suffix: config.source_suffix().to_string(),
            debounce: cli
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.debounce()),
            interactive: cli
                .interactive_override()
                .unwrap_or(config.interactive() && stdin_is_terminal),
        })
    }
}

/// Run the application.
///
/// This is the main entry point called from `main.rs`.
///
/// # Errors
///
/// Returns an error if configuration, the store, or a watcher cannot be set
/// up, or if the store fails while the loop runs.
pub async fn run(cli: Cli) -> Result<()> {
    let loaded = Config::load(Some(cli.codebase.as_path())).context("Failed to load configuration")?;
    let settings = Settings::resolve(&cli, &loaded.config, args::stdin_is_terminal())?;
    debug!(?settings, "resolved settings");

    let console = Console::terminal(Verbosity::from_flags(cli.quiet, cli.debug));
    let store = FileBranchStore::open(&settings.codebase).with_context(|| {
        format!("Failed to open codebase at {}", settings.codebase.display())
    })?;
    let branches_dir = store.paths().branches_dir();
    let store: Arc<dyn BranchStore> = Arc::new(store);

    let branch = match store
        .get(&settings.branch)
        .with_context(|| format!("Failed to read branch '{}'", settings.branch))?
    {
        Some(branch) => branch,
        None => {
            info!(branch = %settings.branch, "creating branch");
            reconcile_and_write(store.as_ref(), &settings.branch, &Branch::empty())
                .with_context(|| format!("Failed to create branch '{}'", settings.branch))?
        }
    };
    let session = Session::new(settings.branch.clone(), branch);

    let events = Arc::new(TQueue::new());
    let raw_paths = Arc::new(TQueue::new());
    let input = LineBuffer::new(Arc::new(TQueue::new()));
    let runtime = RuntimeHandle::acquire(Arc::new(SummaryRuntime::new(console.clone())));
    let (current_file, current_file_rx) = watch::channel(session.file_name());

    let _sources = watch_sources(&settings.source_dir, &settings.source_suffix, events.clone())
        .with_context(|| format!("Failed to watch {}", settings.source_dir.display()))?;
    let _branches = watch_branch_files(&branches_dir, raw_paths.clone())
        .with_context(|| format!("Failed to watch {}", branches_dir.display()))?;
    let debouncer = tokio::spawn(run_debouncer(
        raw_paths,
        events.clone(),
        settings.debounce,
        current_file_rx,
    ));
    reader::spawn_keystroke_reader(input.clone()).context("Failed to read standard input")?;

    let ctx = engine::Context {
        store,
        console,
        input,
        interactive: settings.interactive,
    };
    let dispatcher = Dispatcher::new(
        ctx,
        Arc::new(DeclarationFrontend::new()),
        runtime,
        events,
        current_file,
    );

    let result = dispatcher.run(session).await;
    debouncer.abort();
    result.map(|_| ())
}
