//! engine::dispatcher
//!
//! The single consumer of events and command lines.
//!
//! # States
//!
//! - **Awaiting input**: the prompt is shown and the dispatcher races "an
//!   event is queued" against "a complete line is buffered"
//! - **Processing**: exactly one event or one line is handled, producing the
//!   next [`Session`]
//!
//! # Invariants
//!
//! - Only the dispatcher reads the event queue and the line buffer
//! - A ready line wins over a ready event (`biased` select, line first)
//! - Waiting never consumes anything; the winner is removed afterwards, so
//!   the losing side keeps its item for a later iteration
//! - The runtime is released on every way out of [`Dispatcher::run`]
//! - Store calls run on the blocking pool, never on the dispatcher's task

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::command::{parse_line, Parsed};
use super::event::Event;
use super::handlers::{self, report_conflicts, Transition};
use super::session::Session;
use super::Context;
use crate::frontend::{CheckOutcome, Frontend, RuntimeHandle};
use crate::queue::TQueue;
use crate::watch::without_own_writes;

enum Ready {
    Line,
    Event,
    InputClosed,
    EventsClosed,
}

/// Event loop over a [`Session`].
pub struct Dispatcher {
    ctx: Context,
    frontend: Arc<dyn Frontend>,
    runtime: RuntimeHandle,
    events: Arc<TQueue<Event>>,
    current_file: watch::Sender<String>,
}

impl Dispatcher {
    pub fn new(
        ctx: Context,
        frontend: Arc<dyn Frontend>,
        runtime: RuntimeHandle,
        events: Arc<TQueue<Event>>,
        current_file: watch::Sender<String>,
    ) -> Self {
        Self {
            ctx,
            frontend,
            runtime,
            events,
            current_file,
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Run until `quit` or end of input, returning the final session.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch store fails; the runtime is still released.
    pub async fn run(&self, session: Session) -> Result<Session> {
        let result = self.run_loop(session).await;
        self.runtime.release();
        result
    }

    async fn run_loop(&self, mut session: Session) -> Result<Session> {
        let mut events_open = true;
        info!(branch = %session.name, "command loop started");

        loop {
            self.current_file.send_replace(session.file_name());
            self.ctx
                .console
                .prompt(&session.name, &self.ctx.input.incomplete_line());

            let ready = tokio::select! {
                biased;
                line = self.ctx.input.await_complete_line() => match line {
                    Ok(()) => Ready::Line,
                    Err(_) => Ready::InputClosed,
                },
                event = self.events.peek(), if events_open => match event {
                    Ok(_) => Ready::Event,
                    Err(_) => Ready::EventsClosed,
                },
            };

            let transition = match ready {
                Ready::Line => match self.ctx.input.take_line().await {
                    Ok(line) => self.handle_line(session, &line).await?,
                    Err(_) => Transition::Quit(session),
                },
                Ready::Event => match self.events.try_dequeue() {
                    Some(event) => {
                        self.ctx.console.interrupt_prompt();
                        Transition::Continue(self.handle_event(session, event).await?)
                    }
                    None => Transition::Continue(session),
                },
                Ready::InputClosed => {
                    debug!("input closed");
                    self.ctx.console.interrupt_prompt();
                    Transition::Quit(session)
                }
                Ready::EventsClosed => {
                    debug!("event queue closed");
                    events_open = false;
                    Transition::Continue(session)
                }
            };

            match transition {
                Transition::Continue(next) => session = next,
                Transition::Quit(last) => {
                    info!(branch = %last.name, "command loop finished");
                    return Ok(last);
                }
            }
        }
    }

    /// Handle one typed line.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch store fails.
    pub async fn handle_line(&self, session: Session, line: &str) -> Result<Transition> {
        match parse_line(line) {
            Parsed::Blank => Ok(Transition::Continue(session)),
            Parsed::Invalid(message) => {
                self.ctx.console.error(message);
                Ok(Transition::Continue(session))
            }
            Parsed::Command(command) => {
                debug!(?command, "dispatching command");
                handlers::execute(&self.ctx, session, command).await
            }
        }
    }

    /// Handle one dequeued event.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch store fails during a fallback write.
    pub async fn handle_event(&self, session: Session, event: Event) -> Result<Session> {
        debug!(kind = event.kind(), "handling event");
        match event {
            Event::SourceChanged { path, content } => {
                Ok(self.check_source(session, path, &content).await)
            }
            Event::BranchPathsChanged { paths } => self.reload(session, &paths).await,
        }
    }

    async fn check_source(&self, session: Session, path: PathBuf, content: &str) -> Session {
        match self.frontend.check(&path, content) {
            CheckOutcome::Diagnostics(diagnostics) => {
                self.ctx.console.error(format!(
                    "{} has {} problem(s):",
                    path.display(),
                    diagnostics.len()
                ));
                for diagnostic in diagnostics {
                    self.ctx.console.print(format!("  {diagnostic}"));
                }
                session
            }
            CheckOutcome::Checked(program) => {
                if let Err(e) = self.runtime.evaluate(&program, &session.branch).await {
                    self.ctx.console.error(e);
                }
                session.with_latest(program)
            }
        }
    }

    async fn reload(&self, session: Session, paths: &BTreeSet<PathBuf>) -> Result<Session> {
        let changed = without_own_writes(paths, &session.file_name());
        if changed.is_empty() {
            debug!("only own writes changed");
            return Ok(session);
        }

        let name = session.name.clone();
        match self.ctx.with_store(move |store| store.get(&name)).await {
            Ok(Some(branch)) => {
                if branch != session.branch {
                    info!(branch = %session.name, "reloaded branch from disk");
                    self.ctx.console.print(format!(
                        "Branch '{}' changed on disk; reloaded.",
                        session.name
                    ));
                    report_conflicts(&self.ctx, &branch);
                }
                Ok(session.with_branch(branch))
            }
            Ok(None) => {
                warn!(branch = %session.name, "no readable snapshot on disk");
                self.restore(session).await
            }
            Err(e) => {
                warn!(branch = %session.name, error = %e, "reload failed");
                self.restore(session).await
            }
        }
    }

    /// Write the in-memory branch back when the durable one cannot be read.
    async fn restore(&self, session: Session) -> Result<Session> {
        let branch = self
            .ctx
            .reconcile(&session.name, &session.branch)
            .await
            .with_context(|| format!("Failed to restore branch '{}'", session.name))?;
        self.ctx.console.warn(format!(
            "Could not reload branch '{}'; wrote the in-memory branch back.",
            session.name
        ));
        Ok(session.with_branch(branch))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("runtime", &self.runtime)
            .field("pending_events", &self.events.len())
            .finish()
    }
}
