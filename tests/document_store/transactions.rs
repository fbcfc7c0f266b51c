//! Transaction lifecycle: isolation, commit replay and rollback.

use crate::common::*;
use proptest::prelude::*;
use serde_json::json;
use verso::{Attributes, ChildRef, Error, NodeUpdate, TextRange};

#[test]
fn test_uncommitted_changes_stay_out_of_the_base() {
    let mut store = sample_store();
    let before = store.base().clone();

    store.begin().unwrap();
    let id = store
        .add_child("body", Node::text("paragraph", "third"), None)
        .unwrap();
    store.delete_node("p1").unwrap();

    assert!(store.contains(&id));
    assert!(!store.contains("p1"));
    assert_eq!(child_ids(&store, "body"), vec!["p2".to_string(), id.to_string()]);
    assert_eq!(store.base(), &before);
}

#[test]
fn test_rollback_restores_the_committed_view() {
    let mut store = sample_store();
    let before = store.base().clone();

    store.begin().unwrap();
    store.move_node("p2", "root", Some(0)).unwrap();
    store
        .update_node("p1", NodeUpdate::new().text("changed"), false)
        .unwrap();
    store
        .apply_mark(&TextRange::within("title", 0, 5), &Mark::full("bold"))
        .unwrap();
    store.rollback();

    assert!(!store.in_transaction());
    assert_eq!(store.base(), &before);
    assert_eq!(store.get_node("p1").unwrap().text.as_deref(), Some("first"));
    assert_eq!(child_ids(&store, "root"), vec!["title", "body"]);
    assert!(store.operations().is_empty());
}

#[test]
fn test_commit_persists_every_mutation() {
    let mut store = sample_store();
    store.begin().unwrap();
    let id = store
        .add_child("body", Node::text("paragraph", "third").with_id("p3"), Some(0))
        .unwrap();
    store.move_node("title", "body", None).unwrap();
    store.delete_node("p1").unwrap();
    let summary = store.commit().unwrap();

    assert_eq!(id, "p3");
    assert!(summary.applied.total_operations() >= 3);
    assert_eq!(summary.applied.skipped, 0);
    assert_eq!(child_ids(&store, "root"), vec!["body"]);
    assert_eq!(child_ids(&store, "body"), vec!["p3", "p2", "title"]);
    assert!(!store.base().contains("p1"));
    assert_eq!(
        store.base().get("title").unwrap().parent_id.as_ref(),
        Some(&NodeId::new("body"))
    );
    assert!(store.pending_operations().is_empty());
}

#[test]
fn test_versions_bump_once_per_transaction() {
    let mut store = sample_store();
    let version = store.get_node("p1").unwrap().version;

    store
        .transaction(|s| {
            s.update_node("p1", NodeUpdate::new().text("one"), false)?;
            s.update_node("p1", NodeUpdate::new().text("two"), false)?;
            Ok(())
        })
        .unwrap();

    let node = store.base().get("p1").unwrap();
    assert_eq!(node.text.as_deref(), Some("two"));
    assert_eq!(node.version, version + 1);
    assert!(node.updated_at >= node.created_at);
}

#[test]
fn test_end_keeps_the_overlay_until_commit() {
    let mut store = sample_store();
    store.begin().unwrap();
    store.move_node("p2", "root", None).unwrap();

    let log = store.end().unwrap();
    assert!(store.in_transaction());
    assert!(log.iter().any(|op| op.kind() == OperationKind::Move));
    assert!(log.iter().any(|op| op.kind() == OperationKind::Update));
    assert_eq!(child_ids(&store, "root"), vec!["title", "body", "p2"]);
    assert_eq!(store.base().get("root").unwrap().children().len(), 2);

    store.commit().unwrap();
    assert_eq!(store.base().get("root").unwrap().children().len(), 3);
}

#[test]
fn test_lifecycle_errors() {
    let mut store = sample_store();
    assert!(matches!(store.commit(), Err(Error::NoActiveTransaction)));
    assert!(matches!(store.end(), Err(Error::NoActiveTransaction)));
    assert!(matches!(
        store.add_child("root", Node::container("section"), None),
        Err(Error::NoActiveTransaction)
    ));

    store.begin().unwrap();
    assert!(matches!(store.begin(), Err(Error::TransactionActive)));
    store.rollback();
    store.rollback();
    assert!(store.begin().is_ok());
}

#[test]
fn test_transaction_closure_rolls_back_on_error() {
    let mut store = sample_store();
    let before = store.base().clone();

    let result = store.transaction(|s| {
        s.delete_node("p1")?;
        s.move_node("root", "p2", None)
    });

    assert!(matches!(result, Err(Error::CycleDetected { .. })));
    assert!(!store.in_transaction());
    assert_eq!(store.base(), &before);
}

#[test]
fn test_aliases_live_for_one_transaction() {
    let mut store = sample_store();
    store.begin().unwrap();
    let id = store.add_child("body", Node::container("list"), None).unwrap();
    store.set_alias("list", &id).unwrap();
    store
        .add_child("list", Node::text("item", "a").with_id("item-a"), None)
        .unwrap();
    store.move_node("p2", "list", None).unwrap();

    assert_eq!(store.resolve("list"), id);
    assert_eq!(child_ids(&store, "list"), vec!["item-a", "p2"]);
    store.commit().unwrap();

    assert_eq!(store.resolve("list"), "list");
    assert_eq!(child_ids(&store, &id), vec!["item-a", "p2"]);
    assert!(store.set_alias("again", "root").is_err());
}

#[test]
fn test_pending_operations_counts_by_kind() {
    let mut store = sample_store();
    store.begin().unwrap();
    store
        .add_child("body", Node::text("paragraph", "x").with_id("px"), None)
        .unwrap();
    store.move_node("p1", "root", None).unwrap();
    store.delete_node("p2").unwrap();

    let pending = store.pending_operations();
    assert_eq!(pending.creates, 1);
    assert_eq!(pending.moves, 1);
    assert_eq!(pending.deletes, 1);
    assert_eq!(pending.total(), pending.creates + pending.updates + pending.moves + pending.deletes);
}

#[test]
fn test_former_root_subtree_can_be_deleted() {
    let mut store = sample_store();
    store.set_node(Node::container("doc").with_id("other"), false).unwrap();
    store.set_root("other").unwrap();

    store.begin().unwrap();
    store.delete_node("root").unwrap();
    store.commit().unwrap();

    assert_eq!(store.root_id(), Some(&NodeId::new("other")));
    assert!(!store.base().contains("title"));
    assert!(!store.base().contains("p2"));
}

#[derive(Debug, Clone)]
enum Step {
    Add(usize),
    Move(usize, usize, Option<usize>),
    Delete(usize),
    Retype(usize),
    Bold(usize),
    Attr(usize, i64),
    Detach(usize, usize),
    Attach(usize, usize),
    // Always fails: the batch repeats an identifier already in use.
    Batch(usize),
    // Always fails: the same child listed twice.
    MoveTwice(usize, usize),
}

const POOL: [&str; 5] = ["root", "title", "body", "p1", "p2"];

fn step() -> impl Strategy<Value = Step> {
    let i = 0..POOL.len();
    prop_oneof![
        i.clone().prop_map(Step::Add),
        (i.clone(), 0..POOL.len(), proptest::option::of(0usize..3))
            .prop_map(|(a, b, p)| Step::Move(a, b, p)),
        i.clone().prop_map(Step::Delete),
        i.clone().prop_map(Step::Retype),
        i.clone().prop_map(Step::Bold),
        (i.clone(), any::<i64>()).prop_map(|(a, v)| Step::Attr(a, v)),
        (i.clone(), i.clone()).prop_map(|(a, b)| Step::Detach(a, b)),
        (i.clone(), i.clone()).prop_map(|(a, b)| Step::Attach(a, b)),
        i.clone().prop_map(Step::Batch),
        (i.clone(), i).prop_map(|(a, b)| Step::MoveTwice(a, b)),
    ]
}

fn run(store: &mut DocumentStore, steps: &[Step]) {
    for step in steps {
        // Individual steps may legitimately fail (cycles, missing nodes).
        let _ = match step {
            Step::Add(p) => store
                .add_child(POOL[*p], Node::text("paragraph", "new"), None)
                .map(|_| ()),
            Step::Move(a, b, pos) => store.move_node(POOL[*a], POOL[*b], *pos),
            Step::Delete(a) => store.delete_node(POOL[*a]),
            Step::Retype(a) => store.transform_node(POOL[*a], "quote", None).map(|_| ()),
            Step::Bold(a) => store
                .apply_mark(&TextRange::within(POOL[*a], 0, 2), &Mark::full("bold"))
                .map(|_| ()),
            Step::Attr(a, v) => {
                let mut attrs = Attributes::new();
                attrs.insert("n".to_string(), json!(v));
                store
                    .update_node(POOL[*a], NodeUpdate::new().attributes(attrs), false)
                    .map(|_| ())
            }
            Step::Detach(a, b) => store.remove_child(POOL[*a], POOL[*b]).map(|_| ()),
            Step::Attach(a, b) => store
                .add_child(POOL[*a], ChildRef::Existing(NodeId::new(POOL[*b])), Some(0))
                .map(|_| ()),
            Step::Batch(p) => store
                .add_children(
                    POOL[*p],
                    vec![
                        Node::text("paragraph", "fresh").into(),
                        Node::text("paragraph", "clash").with_id("p1").into(),
                    ],
                    None,
                )
                .map(|_| ()),
            Step::MoveTwice(a, b) => store.move_children(POOL[*a], POOL[*b], &["p1", "p1"], Some(0)),
        };
    }
}

proptest! {
    #[test]
    fn prop_rollback_is_the_identity(steps in proptest::collection::vec(step(), 0..12)) {
        let mut store = sample_store();
        let before = store.base().clone();

        store.begin().unwrap();
        run(&mut store, &steps);
        store.rollback();

        prop_assert_eq!(store.base(), &before);
    }

    #[test]
    fn prop_commit_matches_the_resolved_view(steps in proptest::collection::vec(step(), 0..12)) {
        let mut store = sample_store();

        store.begin().unwrap();
        run(&mut store, &steps);
        store.end().unwrap();
        let view: NodeStore = store.export_flat().into_values().collect();
        store.commit().unwrap();

        prop_assert_eq!(structure(store.base()), structure(&view));
    }
}
