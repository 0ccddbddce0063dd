//! engine::handlers
//!
//! Execution of prompt commands.
//!
//! # Contract
//!
//! Every handler takes the current [`Session`] by value and returns the next
//! one. User errors (unknown branch, ambiguous name, taken name) are printed
//! and return the session unchanged. Only store failures are returned as
//! `Err`. Every change to a branch goes through [`Context::reconcile`], and
//! every store call runs on the blocking pool via [`Context::with_store`].

use std::collections::BTreeSet;

use anyhow::{Context as _, Result};
use tracing::debug;

use super::command::{help_text, ReplCommand};
use super::session::Session;
use super::Context;
use crate::core::branch::{Branch, Dimension, Resolved};
use crate::core::types::{BranchName, Name};
use crate::frontend::runtime::{status_of, DefinitionStatus};
use crate::ui::prompts::{self, PromptError};

/// What the loop does after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Continue(Session),
    Quit(Session),
}

/// Answers offered when a rename target is both a term and a type.
pub const RENAME_CHOICES: [&str; 4] = ["term", "type", "both", "neither"];

/// Execute one command against `session`.
///
/// # Errors
///
/// Returns an error if the branch store cannot be read or written.
pub async fn execute(ctx: &Context, session: Session, command: ReplCommand) -> Result<Transition> {
    let session = match command {
        ReplCommand::Branch { name: None } => {
            list_branches(ctx, &session).await?;
            session
        }
        ReplCommand::Branch { name: Some(name) } => switch(ctx, session, &name).await?,
        ReplCommand::Fork { name } => fork(ctx, session, &name).await?,
        ReplCommand::Merge { from } => merge(ctx, session, &from).await?,
        ReplCommand::Rename { from, to } => rename(ctx, session, &from, &to).await?,
        ReplCommand::Add => add(ctx, session).await?,
        ReplCommand::Names { query } => {
            names(ctx, &session, query.as_deref());
            session
        }
        ReplCommand::Help => {
            ctx.console.print(help_text().trim_end());
            session
        }
        ReplCommand::Quit => return Ok(Transition::Quit(session)),
    };
    Ok(Transition::Continue(session))
}

fn parse_branch_name(ctx: &Context, raw: &str) -> Option<BranchName> {
    match BranchName::new(raw) {
        Ok(name) => Some(name),
        Err(e) => {
            ctx.console.error(e);
            None
        }
    }
}

fn parse_name(ctx: &Context, raw: &str) -> Option<Name> {
    match Name::new(raw) {
        Ok(name) => Some(name),
        Err(e) => {
            ctx.console.error(e);
            None
        }
    }
}

/// Warn about every conflicted name and divergent rename in `branch`.
pub fn report_conflicts(ctx: &Context, branch: &Branch) {
    for dimension in [Dimension::Term, Dimension::Type] {
        for (name, references) in branch.conflicts(dimension) {
            ctx.console.warn(format!(
                "{dimension} '{name}' is conflicted between {} definitions",
                references.len()
            ));
        }
        for divergent in branch.divergent_renames(dimension) {
            ctx.console.warn(format!(
                "{dimension} '{}' was renamed to {} by separate edits; rename one onto the other to settle it",
                divergent.from,
                quoted(&divergent.to)
            ));
        }
    }
}

fn quoted(names: &BTreeSet<Name>) -> String {
    names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(" and ")
}

async fn list_branches(ctx: &Context, session: &Session) -> Result<()> {
    let mut names = ctx
        .with_store(|store| store.list())
        .await
        .context("Failed to list branches")?;
    names.insert(session.name.clone());
    for name in names {
        let marker = if name == session.name { "*" } else { " " };
        ctx.console.print(format!("{marker} {name}"));
    }
    Ok(())
}

async fn switch(ctx: &Context, session: Session, raw: &str) -> Result<Session> {
    let Some(name) = parse_branch_name(ctx, raw) else {
        return Ok(session);
    };
    let target = name.clone();
    let loaded = ctx
        .with_store(move |store| store.get(&target))
        .await
        .with_context(|| format!("Failed to read branch '{name}'"))?;

    match loaded {
        None => {
            ctx.console.error(format!("Branch '{name}' does not exist."));
            Ok(session)
        }
        Some(branch) => {
            ctx.console.print(format!("Switched to branch '{name}'."));
            report_conflicts(ctx, &branch);
            Ok(session.switch(name, branch))
        }
    }
}

async fn fork(ctx: &Context, session: Session, raw: &str) -> Result<Session> {
    let Some(name) = parse_branch_name(ctx, raw) else {
        return Ok(session);
    };
    let target = name.clone();
    if ctx
        .with_store(move |store| store.exists(&target))
        .await
        .with_context(|| format!("Failed to read branch '{name}'"))?
    {
        ctx.console
            .error(format!("A branch named '{name}' already exists."));
        return Ok(session);
    }

    let branch = ctx
        .reconcile(&name, &session.branch)
        .await
        .with_context(|| format!("Failed to write branch '{name}'"))?;
    ctx.console
        .print(format!("Forked '{}' as '{name}'; now on '{name}'.", session.name));
    Ok(session.switch(name, branch))
}

async fn merge(ctx: &Context, session: Session, raw: &str) -> Result<Session> {
    let Some(from) = parse_branch_name(ctx, raw) else {
        return Ok(session);
    };
    let source = from.clone();
    let other = ctx
        .with_store(move |store| store.get(&source))
        .await
        .with_context(|| format!("Failed to read branch '{from}'"))?;
    let Some(other) = other else {
        ctx.console.error(format!("Branch '{from}' does not exist."));
        return Ok(session);
    };

    let candidate = session.branch.merge(&other);
    let branch = ctx
        .reconcile(&session.name, &candidate)
        .await
        .with_context(|| format!("Failed to write branch '{}'", session.name))?;
    ctx.console
        .print(format!("Merged '{from}' into '{}'.", session.name));
    report_conflicts(ctx, &branch);
    Ok(session.with_branch(branch))
}

async fn rename(ctx: &Context, session: Session, from: &str, to: &str) -> Result<Session> {
    let (Some(from), Some(to)) = (parse_name(ctx, from), parse_name(ctx, to)) else {
        return Ok(session);
    };

    let terms = session.branch.resolve(Dimension::Term, &from);
    let types = session.branch.resolve(Dimension::Type, &from);

    let targets: Vec<(Dimension, Resolved)> = match (single(&terms), single(&types)) {
        _ if terms.is_empty() && types.is_empty() => {
            ctx.console
                .error(format!("Nothing found by the name '{from}'."));
            return Ok(session);
        }
        _ if terms.len() > 1 || types.len() > 1 => {
            report_ambiguity(ctx, &session.branch, &from, &terms, &types);
            return Ok(session);
        }
        (Some(term), None) => vec![(Dimension::Term, term)],
        (None, Some(ty)) => vec![(Dimension::Type, ty)],
        (Some(term), Some(ty)) => match choose_dimensions(ctx, &from).await {
            Some(dimensions) => dimensions
                .into_iter()
                .map(|d| match d {
                    Dimension::Term => (d, term.clone()),
                    Dimension::Type => (d, ty.clone()),
                })
                .collect(),
            None => return Ok(session),
        },
        (None, None) => return Ok(session),
    };

    for (dimension, resolved) in &targets {
        // Renaming onto a name already bound to the same definition joins
        // the two bindings.
        let taken = session.branch.names(*dimension).references(&to);
        if resolved.name != to && taken.iter().any(|r| r != &resolved.reference) {
            ctx.console
                .error(format!("A {dimension} named '{to}' already exists."));
            return Ok(session);
        }
    }

    let mut branch = session.branch.clone();
    for (dimension, resolved) in targets {
        let candidate = branch.rename(dimension, &resolved.name, &resolved.reference, to.clone());
        branch = ctx
            .reconcile(&session.name, &candidate)
            .await
            .with_context(|| format!("Failed to write branch '{}'", session.name))?;
        debug!(%dimension, from = %resolved.name, %to, "renamed");
        ctx.console.print(format!(
            "Renamed {dimension} '{}' to '{to}'.",
            resolved.name
        ));
    }
    Ok(session.with_branch(branch))
}

fn single(resolved: &BTreeSet<Resolved>) -> Option<Resolved> {
    match resolved.len() {
        1 => resolved.iter().next().cloned(),
        _ => None,
    }
}

fn report_ambiguity(
    ctx: &Context,
    branch: &Branch,
    from: &Name,
    terms: &BTreeSet<Resolved>,
    types: &BTreeSet<Resolved>,
) {
    ctx.console
        .error(format!("'{from}' is ambiguous; it could refer to:"));
    for (dimension, matches) in [(Dimension::Term, terms), (Dimension::Type, types)] {
        for resolved in matches {
            let summary = branch
                .definition(&resolved.reference)
                .and_then(|d| d.source.lines().next())
                .unwrap_or_default();
            ctx.console.print(format!(
                "  {dimension} {} #{}  {summary}",
                resolved.name,
                resolved.reference.short(8)
            ));
        }
    }
    ctx.console.print(
        "Disambiguate manually (use a longer name, or rename the conflicting \
         definitions apart), then try again.",
    );
}

/// Ask which dimensions to rename. `None` means leave the branch alone.
async fn choose_dimensions(ctx: &Context, from: &Name) -> Option<Vec<Dimension>> {
    let question = format!("'{from}' names both a term and a type. Rename which?");
    match prompts::select(&ctx.console, &ctx.input, &question, &RENAME_CHOICES, ctx.interactive).await
    {
        Ok(0) => Some(vec![Dimension::Term]),
        Ok(1) => Some(vec![Dimension::Type]),
        Ok(2) => Some(vec![Dimension::Term, Dimension::Type]),
        Ok(_) => None,
        Err(PromptError::NotInteractive) => {
            ctx.console.error(format!(
                "'{from}' names both a term and a type and prompts are disabled; nothing was renamed."
            ));
            None
        }
        Err(PromptError::Cancelled) => None,
    }
}

async fn add(ctx: &Context, session: Session) -> Result<Session> {
    let Some(program) = session.latest.clone() else {
        ctx.console
            .error("No source file has been checked yet; save one first.");
        return Ok(session);
    };

    let mut candidate = session.branch.clone();
    let mut added = 0;
    for (name, definition) in &program.definitions {
        if status_of(&candidate, name, definition) == DefinitionStatus::Unchanged {
            continue;
        }
        match candidate.add(name.clone(), definition.clone()) {
            Ok(next) => {
                candidate = next;
                added += 1;
            }
            Err(e) => ctx.console.warn(format!("Skipped: {e}")),
        }
    }

    if added == 0 {
        ctx.console.print("Nothing to add.");
        return Ok(session);
    }

    let branch = ctx
        .reconcile(&session.name, &candidate)
        .await
        .with_context(|| format!("Failed to write branch '{}'", session.name))?;
    ctx.console.print(format!(
        "Added {added} definition(s) from {} to '{}'.",
        program.path.display(),
        session.name
    ));
    Ok(session.with_branch(branch))
}

fn names(ctx: &Context, session: &Session, query: Option<&str>) {
    let query = match query.map(Name::new).transpose() {
        Ok(query) => query,
        Err(e) => {
            ctx.console.error(e);
            return;
        }
    };

    let mut shown = 0;
    for dimension in [Dimension::Term, Dimension::Type] {
        let divergent = session.branch.divergent_renames(dimension);
        for (name, references) in session.branch.names(dimension).entries() {
            if query.as_ref().is_some_and(|q| !name.ends_with(q)) {
                continue;
            }
            let mut line = format!("{dimension} {name}");
            if references.len() > 1 {
                line.push_str(&format!(" (conflicted: {} definitions)", references.len()));
            }
            for rename in divergent.iter().filter(|d| d.to.contains(&name)) {
                line.push_str(&format!(" (diverging rename of '{}')", rename.from));
            }
            ctx.console.print(line);
            shown += 1;
        }
    }
    if shown == 0 {
        ctx.console.print("No names.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::branch::Definition;
    use crate::queue::{LineBuffer, TQueue};
    use crate::store::{BranchStore, MemoryBranchStore};
    use crate::ui::output::Console;
    use std::sync::Arc;

    fn bn(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn with(branch: &Branch, n: &str, kind: Dimension, source: &str) -> Branch {
        branch.add(name(n), Definition::new(kind, source)).unwrap()
    }

    fn context(store: MemoryBranchStore) -> Context {
        Context {
            store: Arc::new(store),
            console: Console::captured(),
            input: LineBuffer::new(Arc::new(TQueue::new())),
            interactive: true,
        }
    }

    async fn run(ctx: &Context, session: Session, command: ReplCommand) -> Session {
        match execute(ctx, session, command).await.unwrap() {
            Transition::Continue(s) => s,
            Transition::Quit(s) => panic!("unexpected quit: {s:?}"),
        }
    }

    #[tokio::test]
    async fn branch_lists_and_marks_current() {
        let store = MemoryBranchStore::new()
            .with_branch(&bn("master"), Branch::empty())
            .with_branch(&bn("topic"), Branch::empty());
        let ctx = context(store);
        let session = Session::new(bn("topic"), Branch::empty());

        run(&ctx, session, ReplCommand::Branch { name: None }).await;
        assert_eq!(ctx.console.lines(), vec!["  master", "* topic"]);
    }

    #[tokio::test]
    async fn switch_to_missing_branch_keeps_state() {
        let ctx = context(MemoryBranchStore::new());
        let session = Session::new(bn("master"), Branch::empty());

        let next = run(
            &ctx,
            session.clone(),
            ReplCommand::Branch {
                name: Some("nope".into()),
            },
        )
        .await;

        assert_eq!(next, session);
        assert!(ctx.console.transcript().contains("'nope' does not exist"));
    }

    #[tokio::test]
    async fn switch_loads_branch() {
        let topic = with(&Branch::empty(), "foo", Dimension::Term, "foo = 1");
        let ctx = context(MemoryBranchStore::new().with_branch(&bn("topic"), topic.clone()));
        let session = Session::new(bn("master"), Branch::empty());

        let next = run(
            &ctx,
            session,
            ReplCommand::Branch {
                name: Some("topic".into()),
            },
        )
        .await;

        assert_eq!(next.name, bn("topic"));
        assert_eq!(next.branch, topic);
    }

    #[tokio::test]
    async fn merge_reconciles_under_current_name() {
        let ours = with(&Branch::empty(), "ours", Dimension::Term, "ours = 1");
        let theirs = with(&Branch::empty(), "theirs", Dimension::Term, "theirs = 1");
        let store = MemoryBranchStore::new()
            .with_branch(&bn("master"), ours.clone())
            .with_branch(&bn("topic"), theirs.clone());
        let ctx = context(store.clone());
        let session = Session::new(bn("master"), ours.clone());

        let next = run(&ctx, session, ReplCommand::Merge { from: "topic".into() }).await;

        assert_eq!(next.branch, ours.merge(&theirs));
        assert_eq!(store.get(&bn("master")).unwrap(), Some(next.branch.clone()));
    }

    #[tokio::test]
    async fn merge_from_missing_branch_fails() {
        let store = MemoryBranchStore::new();
        let ctx = context(store.clone());
        let session = Session::new(bn("master"), Branch::empty());

        let next = run(&ctx, session.clone(), ReplCommand::Merge { from: "gone".into() }).await;

        assert_eq!(next, session);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn rename_refuses_taken_target() {
        let branch = with(&Branch::empty(), "foo", Dimension::Term, "foo = 1");
        let branch = with(&branch, "bar", Dimension::Term, "bar = 1");
        let store = MemoryBranchStore::new();
        let ctx = context(store.clone());
        let session = Session::new(bn("master"), branch);

        let next = run(
            &ctx,
            session.clone(),
            ReplCommand::Rename {
                from: "foo".into(),
                to: "bar".into(),
            },
        )
        .await;

        assert_eq!(next, session);
        assert!(store.writes().is_empty());
        assert!(ctx.console.transcript().contains("term named 'bar' already exists"));
    }

    #[tokio::test]
    async fn rename_with_unknown_name_reports() {
        let ctx = context(MemoryBranchStore::new());
        let session = Session::new(bn("master"), Branch::empty());

        let next = run(
            &ctx,
            session.clone(),
            ReplCommand::Rename {
                from: "foo".into(),
                to: "bar".into(),
            },
        )
        .await;

        assert_eq!(next, session);
        assert!(ctx.console.transcript().contains("Nothing found by the name 'foo'"));
    }

    #[tokio::test]
    async fn rename_both_without_prompts_does_nothing() {
        let branch = with(&Branch::empty(), "foo", Dimension::Term, "foo = 1");
        let branch = with(&branch, "foo", Dimension::Type, "type foo = Foo");
        let store = MemoryBranchStore::new();
        let mut ctx = context(store.clone());
        ctx.interactive = false;
        let session = Session::new(bn("master"), branch);

        let next = run(
            &ctx,
            session.clone(),
            ReplCommand::Rename {
                from: "foo".into(),
                to: "bar".into(),
            },
        )
        .await;

        assert_eq!(next, session);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn add_without_checked_file_is_a_user_error() {
        let ctx = context(MemoryBranchStore::new());
        let session = Session::new(bn("master"), Branch::empty());

        let next = run(&ctx, session.clone(), ReplCommand::Add).await;

        assert_eq!(next, session);
        assert!(ctx.console.transcript().contains("No source file has been checked"));
    }

    #[tokio::test]
    async fn add_skips_taken_names() {
        use crate::frontend::CheckedProgram;
        use std::path::PathBuf;

        let branch = with(&Branch::empty(), "foo", Dimension::Term, "foo = 1");
        let store = MemoryBranchStore::new();
        let ctx = context(store.clone());
        let session = Session::new(bn("master"), branch).with_latest(CheckedProgram {
            path: PathBuf::from("scratch.u"),
            definitions: vec![
                (name("foo"), Definition::new(Dimension::Term, "foo = 2")),
                (name("bar"), Definition::new(Dimension::Term, "bar = 1")),
            ],
            watches: Vec::new(),
        });

        let next = run(&ctx, session, ReplCommand::Add).await;

        let terms = next.branch.names(Dimension::Term);
        assert_eq!(terms.references(&name("foo")).len(), 1);
        assert_eq!(terms.references(&name("bar")).len(), 1);
        assert!(ctx.console.transcript().contains("Skipped: term 'foo' already exists"));
        assert_eq!(store.get(&bn("master")).unwrap(), Some(next.branch));
    }

    #[tokio::test]
    async fn names_marks_conflicts() {
        let left = with(&Branch::empty(), "x", Dimension::Term, "x = 1");
        let right = with(&Branch::empty(), "x", Dimension::Term, "x = 2");
        let branch = with(&left.merge(&right), "Point", Dimension::Type, "type Point = P");
        let ctx = context(MemoryBranchStore::new());
        let session = Session::new(bn("master"), branch);

        run(&ctx, session, ReplCommand::Names { query: None }).await;

        assert_eq!(
            ctx.console.lines(),
            vec!["term x (conflicted: 2 definitions)", "type Point"]
        );
    }

    #[tokio::test]
    async fn divergent_renames_are_reported_and_marked() {
        let base = with(&Branch::empty(), "foo", Dimension::Term, "foo = 1");
        let reference = Definition::new(Dimension::Term, "foo = 1").reference();
        let left = base.rename(Dimension::Term, &name("foo"), &reference, name("bar"));
        let right = base.rename(Dimension::Term, &name("foo"), &reference, name("baz"));
        let store = MemoryBranchStore::new()
            .with_branch(&bn("master"), left.clone())
            .with_branch(&bn("topic"), right);
        let ctx = context(store);
        let session = Session::new(bn("master"), left);

        let next = run(&ctx, session, ReplCommand::Merge { from: "topic".into() }).await;
        assert!(ctx.console.transcript().contains(
            "warning: term 'foo' was renamed to 'bar' and 'baz' by separate edits"
        ));

        let ctx = context(MemoryBranchStore::new());
        run(&ctx, next, ReplCommand::Names { query: None }).await;
        assert_eq!(
            ctx.console.lines(),
            vec![
                "term bar (diverging rename of 'foo')",
                "term baz (diverging rename of 'foo')"
            ]
        );
    }

    #[tokio::test]
    async fn rename_onto_same_definition_settles_divergence() {
        let base = with(&Branch::empty(), "foo", Dimension::Term, "foo = 1");
        let reference = Definition::new(Dimension::Term, "foo = 1").reference();
        let left = base.rename(Dimension::Term, &name("foo"), &reference, name("bar"));
        let right = base.rename(Dimension::Term, &name("foo"), &reference, name("baz"));
        let store = MemoryBranchStore::new();
        let ctx = context(store.clone());
        let session = Session::new(bn("master"), left.merge(&right));

        let next = run(
            &ctx,
            session,
            ReplCommand::Rename {
                from: "baz".into(),
                to: "bar".into(),
            },
        )
        .await;

        assert!(next.branch.divergent_renames(Dimension::Term).is_empty());
        assert_eq!(next.branch.names(Dimension::Term).len(), 1);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn quit_ends_the_loop() {
        let ctx = context(MemoryBranchStore::new());
        let session = Session::new(bn("master"), Branch::empty());
        let transition = execute(&ctx, session.clone(), ReplCommand::Quit).await.unwrap();
        assert_eq!(transition, Transition::Quit(session));
    }
}
