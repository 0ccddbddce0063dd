//! Integration tests for the command loop.
//!
//! These drive a [`Dispatcher`] over an in-memory store with scripted input
//! and queued events, and check the resulting session, store writes, and
//! console transcript.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use trellis::core::branch::{Branch, Definition, Dimension};
use trellis::core::types::{BranchName, Name};
use trellis::engine::{Context, Dispatcher, Event, Session, Transition};
use trellis::frontend::{
    CheckedProgram, DeclarationFrontend, Runtime, RuntimeError, RuntimeHandle,
};
use trellis::queue::{LineBuffer, TQueue};
use trellis::store::{BranchStore, MemoryBranchStore, StoreError};
use trellis::ui::output::Console;

// =============================================================================
// Test Fixtures
// =============================================================================

#[derive(Default)]
struct CountingRuntime {
    evaluated: AtomicUsize,
    terminated: AtomicUsize,
}

#[async_trait]
impl Runtime for CountingRuntime {
    async fn evaluate(&self, _: &CheckedProgram, _: &Branch) -> Result<(), RuntimeError> {
        self.evaluated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn terminate(&self) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    dispatcher: Dispatcher,
    store: MemoryBranchStore,
    console: Console,
    input: LineBuffer,
    events: Arc<TQueue<Event>>,
    runtime: Arc<CountingRuntime>,
    current_file: watch::Receiver<String>,
}

fn harness(store: MemoryBranchStore, interactive: bool) -> Harness {
    let console = Console::captured();
    let input = LineBuffer::new(Arc::new(TQueue::new()));
    let events = Arc::new(TQueue::new());
    let runtime = Arc::new(CountingRuntime::default());
    let (tx, rx) = watch::channel(String::new());

    let ctx = Context {
        store: Arc::new(store.clone()),
        console: console.clone(),
        input: input.clone(),
        interactive,
    };
    let dispatcher = Dispatcher::new(
        ctx,
        Arc::new(DeclarationFrontend::new()),
        RuntimeHandle::acquire(runtime.clone()),
        events.clone(),
        tx,
    );

    Harness {
        dispatcher,
        store,
        console,
        input,
        events,
        runtime,
        current_file: rx,
    }
}

fn bn(s: &str) -> BranchName {
    BranchName::new(s).unwrap()
}

fn name(s: &str) -> Name {
    Name::new(s).unwrap()
}

fn term(source: &str) -> Definition {
    Definition::new(Dimension::Term, source)
}

fn ty(source: &str) -> Definition {
    Definition::new(Dimension::Type, source)
}

fn with(branch: &Branch, n: &str, definition: Definition) -> Branch {
    branch.add(name(n), definition).unwrap()
}

/// Feed a script, close input, and run the loop to completion.
async fn run_script(h: &Harness, session: Session, script: &str) -> Session {
    h.input.feed(script);
    h.input.close();
    tokio::time::timeout(Duration::from_secs(5), h.dispatcher.run(session))
        .await
        .expect("dispatcher did not finish")
        .unwrap()
}

// =============================================================================
// Rename
// =============================================================================

#[tokio::test]
async fn rename_single_term() {
    let branch = with(&Branch::empty(), "foo", term("foo = 1"));
    let h = harness(MemoryBranchStore::new().with_branch(&bn("master"), branch.clone()), true);

    let session = run_script(&h, Session::new(bn("master"), branch), "rename foo bar\n").await;

    let terms = session.branch.names(Dimension::Term);
    assert!(terms.references(&name("foo")).is_empty());
    assert_eq!(
        terms.references(&name("bar")),
        BTreeSet::from([term("foo = 1").reference()])
    );
    assert_eq!(h.store.get(&bn("master")).unwrap(), Some(session.branch));
}

#[tokio::test]
async fn rename_term_and_type_both() {
    let branch = with(&Branch::empty(), "foo", term("foo = 1"));
    let branch = with(&branch, "foo", ty("type foo = Foo"));
    let h = harness(MemoryBranchStore::new(), true);

    let session = run_script(
        &h,
        Session::new(bn("master"), branch),
        "rename foo bar\nboth\n",
    )
    .await;

    for dimension in [Dimension::Term, Dimension::Type] {
        let names = session.branch.names(dimension);
        assert!(names.references(&name("foo")).is_empty(), "{dimension} foo remains");
        assert_eq!(names.references(&name("bar")).len(), 1, "{dimension} bar missing");
    }
    assert!(h.console.transcript().contains("names both a term and a type"));
    // Each step is reconciled and written on its own.
    assert_eq!(h.store.writes().len(), 2);
}

#[tokio::test]
async fn rename_term_and_type_neither() {
    let branch = with(&Branch::empty(), "foo", term("foo = 1"));
    let branch = with(&branch, "foo", ty("type foo = Foo"));
    let h = harness(MemoryBranchStore::new(), true);

    let session = run_script(
        &h,
        Session::new(bn("master"), branch.clone()),
        "rename foo bar\nneither\n",
    )
    .await;

    assert_eq!(session.branch, branch);
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn rename_prompt_reasks_then_renames_type_only() {
    let branch = with(&Branch::empty(), "foo", term("foo = 1"));
    let branch = with(&branch, "foo", ty("type foo = Foo"));
    let h = harness(MemoryBranchStore::new(), true);

    let session = run_script(
        &h,
        Session::new(bn("master"), branch),
        "rename foo bar\nwhatever\n2\n",
    )
    .await;

    assert_eq!(session.branch.names(Dimension::Term).references(&name("foo")).len(), 1);
    assert_eq!(session.branch.names(Dimension::Type).references(&name("bar")).len(), 1);
    assert!(h.console.transcript().contains("'whatever' is not one of the choices"));
}

#[tokio::test]
async fn rename_overloaded_name_refuses() {
    let left = with(&Branch::empty(), "foo", term("foo = 1"));
    let right = with(&Branch::empty(), "foo", term("foo = 2"));
    let branch = left.merge(&right);
    let h = harness(MemoryBranchStore::new(), true);

    let session = run_script(&h, Session::new(bn("master"), branch.clone()), "rename foo bar\n").await;

    assert_eq!(session.branch, branch);
    assert!(h.store.writes().is_empty());
    let transcript = h.console.transcript();
    assert!(transcript.contains("'foo' is ambiguous"));
    assert!(transcript.contains("Disambiguate manually"));
}

#[tokio::test]
async fn rename_ambiguous_suffix_refuses() {
    let branch = with(&Branch::empty(), "List.map", term("List.map = 1"));
    let branch = with(&branch, "Set.map", term("Set.map = 1"));
    let h = harness(MemoryBranchStore::new(), true);

    let session = run_script(&h, Session::new(bn("master"), branch.clone()), "rename map fmap\n").await;

    assert_eq!(session.branch, branch);
    assert!(h.console.transcript().contains("List.map"));
    assert!(h.console.transcript().contains("Set.map"));
}

#[tokio::test]
async fn rename_unique_suffix_renames_full_name() {
    let branch = with(&Branch::empty(), "List.map", term("List.map = 1"));
    let h = harness(MemoryBranchStore::new(), true);

    let session = run_script(&h, Session::new(bn("master"), branch), "rename map List.fmap\n").await;

    let terms = session.branch.names(Dimension::Term);
    assert!(terms.references(&name("List.map")).is_empty());
    assert_eq!(terms.references(&name("List.fmap")).len(), 1);
}

// =============================================================================
// Branch commands
// =============================================================================

#[tokio::test]
async fn fork_collision_leaves_everything_untouched() {
    let master = with(&Branch::empty(), "foo", term("foo = 1"));
    let topic = with(&Branch::empty(), "bar", term("bar = 1"));
    let store = MemoryBranchStore::new()
        .with_branch(&bn("master"), master.clone())
        .with_branch(&bn("topic"), topic.clone());
    let h = harness(store, true);
    let start = Session::new(bn("master"), master);

    let session = run_script(&h, start.clone(), "fork topic\n").await;

    assert_eq!(session, start);
    assert!(h.store.writes().is_empty());
    assert_eq!(h.store.get(&bn("topic")).unwrap(), Some(topic));
    assert!(h.console.transcript().contains("'topic' already exists"));
}

#[tokio::test]
async fn fork_then_switch_back() {
    let master = with(&Branch::empty(), "foo", term("foo = 1"));
    let h = harness(MemoryBranchStore::new().with_branch(&bn("master"), master.clone()), true);

    let session = run_script(
        &h,
        Session::new(bn("master"), master.clone()),
        "fork topic\nbranch\nbranch master\n",
    )
    .await;

    assert_eq!(session.name, bn("master"));
    assert_eq!(h.store.get(&bn("topic")).unwrap(), Some(master));
    let lines = h.console.lines();
    assert!(lines.contains(&"  master".to_string()));
    assert!(lines.contains(&"* topic".to_string()));
}

#[tokio::test]
async fn unknown_command_keeps_state_and_continues() {
    let h = harness(MemoryBranchStore::new(), true);
    let start = Session::new(bn("master"), Branch::empty());

    let session = run_script(&h, start.clone(), "frobnicate\n\nnames\n").await;

    assert_eq!(session, start);
    let lines = h.console.lines();
    assert!(lines[0].starts_with("error:") && lines[0].contains("frobnicate"));
    assert!(lines.contains(&"No names.".to_string()));
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn checked_source_can_be_added() {
    let h = harness(MemoryBranchStore::new(), true);
    let session = Session::new(bn("master"), Branch::empty());

    let session = h
        .dispatcher
        .handle_event(
            session,
            Event::SourceChanged {
                path: PathBuf::from("scratch.u"),
                content: "foo = 1\ntype Point = P Nat Nat\n".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(h.runtime.evaluated.load(Ordering::SeqCst), 1);
    assert!(session.latest.is_some());

    let session = match h.dispatcher.handle_line(session, "add").await.unwrap() {
        Transition::Continue(s) => s,
        Transition::Quit(_) => panic!("unexpected quit"),
    };
    assert_eq!(session.branch.names(Dimension::Term).len(), 1);
    assert_eq!(session.branch.names(Dimension::Type).len(), 1);
    assert_eq!(h.store.get(&bn("master")).unwrap(), Some(session.branch));
}

#[tokio::test]
async fn source_diagnostics_are_shown_not_evaluated() {
    let h = harness(MemoryBranchStore::new(), true);
    let start = Session::new(bn("master"), Branch::empty());

    let session = h
        .dispatcher
        .handle_event(
            start.clone(),
            Event::SourceChanged {
                path: PathBuf::from("scratch.u"),
                content: "not a definition\n".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(session, start);
    assert_eq!(h.runtime.evaluated.load(Ordering::SeqCst), 0);
    assert!(h.console.transcript().contains("scratch.u has 1 problem(s)"));
    assert!(h.console.transcript().contains("line 1:"));
}

#[tokio::test]
async fn reload_adopts_durable_branch() {
    let ours = with(&Branch::empty(), "foo", term("foo = 1"));
    let theirs = with(&ours, "bar", term("bar = 1"));
    let h = harness(MemoryBranchStore::new().with_branch(&bn("master"), theirs.clone()), true);

    let session = h
        .dispatcher
        .handle_event(
            Session::new(bn("master"), ours),
            Event::BranchPathsChanged {
                paths: BTreeSet::from([PathBuf::from(theirs.file_name())]),
            },
        )
        .await
        .unwrap();

    assert_eq!(session.branch, theirs);
    assert!(h.store.writes().is_empty());
}

#[tokio::test]
async fn reload_failure_falls_back_to_in_memory_branch() {
    let in_memory = with(&Branch::empty(), "unsaved", term("unsaved = 1"));
    let store = MemoryBranchStore::new().with_branch(&bn("master"), Branch::empty());
    store.hide(&bn("master"));
    let h = harness(store, true);

    let session = h
        .dispatcher
        .handle_event(
            Session::new(bn("master"), in_memory.clone()),
            Event::BranchPathsChanged {
                paths: BTreeSet::from([PathBuf::from("branches/master/other.ubf")]),
            },
        )
        .await
        .unwrap();

    assert_eq!(session.branch, in_memory.merge(&Branch::empty()));
    assert_eq!(session.branch, in_memory);
    assert_eq!(h.store.get(&bn("master")).unwrap(), Some(in_memory));
}

#[tokio::test]
async fn own_write_notification_is_ignored() {
    let branch = with(&Branch::empty(), "foo", term("foo = 1"));
    let store = MemoryBranchStore::new();
    store.hide(&bn("master"));
    let h = harness(store, true);
    let start = Session::new(bn("master"), branch.clone());

    let session = h
        .dispatcher
        .handle_event(
            start.clone(),
            Event::BranchPathsChanged {
                paths: BTreeSet::from([PathBuf::from("branches/master").join(branch.file_name())]),
            },
        )
        .await
        .unwrap();

    assert_eq!(session, start);
    assert!(h.store.writes().is_empty());
}

// =============================================================================
// Loop behavior
// =============================================================================

#[tokio::test]
async fn ready_line_wins_over_ready_event() {
    let h = harness(MemoryBranchStore::new(), true);
    h.events.enqueue(Event::SourceChanged {
        path: PathBuf::from("scratch.u"),
        content: "foo = 1\n".to_string(),
    });

    run_script(&h, Session::new(bn("master"), Branch::empty()), "quit\n").await;

    assert_eq!(h.events.len(), 1);
    assert_eq!(h.runtime.evaluated.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn events_are_handled_while_a_line_is_half_typed() {
    let h = harness(MemoryBranchStore::new(), true);
    let Harness {
        dispatcher,
        input,
        events,
        runtime,
        mut current_file,
        ..
    } = h;

    input.feed("bra");
    let session = Session::new(bn("master"), Branch::empty());
    let expected_file = session.file_name();
    let task = tokio::spawn(async move { dispatcher.run(session).await });

    current_file.changed().await.unwrap();
    assert_eq!(*current_file.borrow(), expected_file);

    events.enqueue(Event::SourceChanged {
        path: PathBuf::from("scratch.u"),
        content: "foo = 1\n".to_string(),
    });
    tokio::time::timeout(Duration::from_secs(5), async {
        while runtime.evaluated.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("event was starved by the partial line");
    assert_eq!(input.incomplete_line(), "bra");

    input.feed("nch\nquit\n");
    let session = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("dispatcher did not finish")
        .unwrap()
        .unwrap();
    assert!(session.latest.is_some());
    assert_eq!(runtime.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn end_of_input_releases_runtime_once() {
    let h = harness(MemoryBranchStore::new(), true);

    run_script(&h, Session::new(bn("master"), Branch::empty()), "").await;
    assert_eq!(h.runtime.terminated.load(Ordering::SeqCst), 1);

    drop(h.dispatcher);
    assert_eq!(h.runtime.terminated.load(Ordering::SeqCst), 1);
}

/// Store whose reads succeed and whose writes always fail.
struct ReadOnlyStore(MemoryBranchStore);

impl BranchStore for ReadOnlyStore {
    fn get(&self, name: &BranchName) -> Result<Option<Branch>, StoreError> {
        self.0.get(name)
    }

    fn put(&self, name: &BranchName, _: &Branch) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: PathBuf::from("branches").join(name.as_str()),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    }

    fn list(&self) -> Result<BTreeSet<BranchName>, StoreError> {
        self.0.list()
    }
}

#[tokio::test]
async fn store_failure_ends_the_loop_and_releases_runtime_once() {
    let console = Console::captured();
    let input = LineBuffer::new(Arc::new(TQueue::new()));
    let runtime = Arc::new(CountingRuntime::default());
    let (tx, _rx) = watch::channel(String::new());
    let ctx = Context {
        store: Arc::new(ReadOnlyStore(MemoryBranchStore::new())),
        console,
        input: input.clone(),
        interactive: true,
    };
    let dispatcher = Dispatcher::new(
        ctx,
        Arc::new(DeclarationFrontend::new()),
        RuntimeHandle::acquire(runtime.clone()),
        Arc::new(TQueue::new()),
        tx,
    );

    // The loop must stop at the failed write, before reaching `names`.
    input.feed("fork x\nnames\nquit\n");
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.run(Session::new(bn("master"), Branch::empty())),
    )
    .await
    .expect("dispatcher did not finish");

    let error = result.unwrap_err();
    assert!(format!("{error:#}").contains("Failed to write branch 'x'"));
    assert!(format!("{error:#}").contains("read-only"));
    assert_eq!(runtime.terminated.load(Ordering::SeqCst), 1);
    assert_eq!(input.incomplete_line(), "names");

    drop(dispatcher);
    assert_eq!(runtime.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn merge_reports_conflicts() {
    let ours = with(&Branch::empty(), "x", term("x = 1"));
    let theirs = with(&Branch::empty(), "x", term("x = 2"));
    let store = MemoryBranchStore::new()
        .with_branch(&bn("master"), ours.clone())
        .with_branch(&bn("topic"), theirs.clone());
    let h = harness(store, true);

    let session = run_script(&h, Session::new(bn("master"), ours.clone()), "merge topic\nnames\n").await;

    assert_eq!(session.branch, ours.merge(&theirs));
    let transcript = h.console.transcript();
    assert!(transcript.contains("term 'x' is conflicted between 2 definitions"));
    assert!(transcript.contains("term x (conflicted: 2 definitions)"));
}
