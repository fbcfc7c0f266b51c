//! Structural edits: insertion, moves, removal, copies and retyping.

use crate::common::*;
use serde_json::json;
use verso::{Attributes, ChildRef, Error};

#[test]
fn test_batch_insert_is_contiguous_and_ordered() {
    let mut store = DocumentStore::new();
    store
        .set_node(Node::container("list").with_id("p"), false)
        .unwrap();
    store
        .transaction(|s| {
            s.add_child("p", Node::text("item", "1").with_id("c1"), None)?;
            s.add_child("p", Node::text("item", "2").with_id("c2"), None)?;
            Ok(())
        })
        .unwrap();

    store.begin().unwrap();
    let ids = store
        .add_children(
            "p",
            vec![
                Node::text("item", "x").with_id("X").into(),
                Node::text("item", "y").with_id("Y").into(),
            ],
            Some(1),
        )
        .unwrap();
    store.commit().unwrap();

    assert_eq!(ids, vec![NodeId::new("X"), NodeId::new("Y")]);
    assert_eq!(child_ids(&store, "p"), vec!["c1", "X", "Y", "c2"]);
    assert_eq!(
        store.base().get("Y").unwrap().parent_id.as_ref(),
        Some(&NodeId::new("p"))
    );
}

#[test]
fn test_generated_ids_carry_the_session() {
    let mut store = sample_store();
    store.set_session_id(7);
    store.begin().unwrap();
    let id = store
        .add_child("body", Node::text("paragraph", "fresh"), None)
        .unwrap();

    assert!(id.as_str().starts_with("7:"));
    assert_eq!(store.get_node(&id).unwrap().parent_id.as_ref(), Some(&NodeId::new("body")));
}

#[test]
fn test_attaching_an_owned_node_is_rejected() {
    let mut store = sample_store();
    store.begin().unwrap();

    let result = store.add_child("root", ChildRef::Existing(NodeId::new("p1")), None);
    assert!(matches!(result, Err(Error::AlreadyAttached { .. })));
    assert_eq!(child_ids(&store, "root"), vec!["title", "body"]);
}

#[test]
fn test_failed_batch_writes_nothing() {
    let mut store = sample_store();
    store.begin().unwrap();

    let result = store.add_children(
        "body",
        vec![
            Node::text("paragraph", "fresh").with_id("fresh").into(),
            Node::text("paragraph", "clash").with_id("p1").into(),
        ],
        None,
    );
    assert!(matches!(result, Err(Error::DuplicateId(id)) if id == "p1"));
    assert!(!store.contains("fresh"));
    assert_eq!(store.pending_operations().total(), 0);

    store
        .add_child("body", Node::text("paragraph", "later").with_id("later"), None)
        .unwrap();
    store.end().unwrap();
    let view: NodeStore = store.export_flat().into_values().collect();
    store.commit().unwrap();

    assert_eq!(structure(store.base()), structure(&view));
    assert_eq!(child_ids(&store, "body"), vec!["p1", "p2", "later"]);
    assert!(!store.base().contains("fresh"));
}

#[test]
fn test_batch_naming_a_node_twice_is_rejected() {
    let mut store = sample_store();
    store.begin().unwrap();
    store.remove_child("body", "p2").unwrap();

    assert!(matches!(
        store.add_children("root", vec!["p2".into(), "p2".into()], None),
        Err(Error::DuplicateId(id)) if id == "p2"
    ));
    assert!(matches!(
        store.add_children(
            "root",
            vec![
                Node::new("hr").with_id("hr").into(),
                Node::new("hr").with_id("hr").into(),
            ],
            None,
        ),
        Err(Error::DuplicateId(_))
    ));
    assert_eq!(child_ids(&store, "root"), vec!["title", "body"]);
    assert!(store.get_node("p2").unwrap().parent_id.is_none());

    assert!(matches!(
        store.move_children("body", "root", &["p1", "p1"], None),
        Err(Error::DuplicateId(id)) if id == "p1"
    ));
    assert_eq!(child_ids(&store, "body"), vec!["p1"]);
    assert_eq!(child_ids(&store, "root"), vec!["title", "body"]);

    store.add_children("root", vec!["p2".into()], Some(0)).unwrap();
    assert_eq!(child_ids(&store, "root"), vec!["p2", "title", "body"]);
}

#[test]
fn test_detached_node_can_be_reattached() {
    let mut store = sample_store();
    store.begin().unwrap();

    assert!(store.remove_child("body", "p1").unwrap());
    assert!(store.get_node("p1").unwrap().parent_id.is_none());
    assert!(!store.remove_child("body", "p1").unwrap());

    store.add_child("root", "p1", Some(0)).unwrap();
    store.commit().unwrap();

    assert_eq!(child_ids(&store, "root"), vec!["p1", "title", "body"]);
    assert_eq!(child_ids(&store, "body"), vec!["p2"]);
}

#[test]
fn test_move_updates_both_parents_and_logs_one_move() {
    let mut store = sample_store();
    let seen = record_operations(&mut store);

    store
        .transaction(|s| s.move_node("p1", "root", Some(1)))
        .unwrap();

    assert_eq!(child_ids(&store, "root"), vec!["title", "p1", "body"]);
    assert_eq!(child_ids(&store, "body"), vec!["p2"]);
    assert_eq!(
        store.base().get("p1").unwrap().parent_id.as_ref(),
        Some(&NodeId::new("root"))
    );

    let seen = seen.lock().unwrap();
    let moves: Vec<_> = seen
        .iter()
        .filter(|op| op.kind() == OperationKind::Move)
        .collect();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].node_id(), "p1");
}

#[test]
fn test_repeated_moves_commit_the_final_placement() {
    let mut store = sample_store();
    store
        .transaction(|s| {
            s.move_node("p2", "root", Some(0))?;
            s.add_child("body", Node::text("paragraph", "mid").with_id("mid"), Some(0))?;
            s.move_node("p2", "body", Some(1))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(child_ids(&store, "root"), vec!["title", "body"]);
    assert_eq!(child_ids(&store, "body"), vec!["mid", "p2", "p1"]);
}

#[test]
fn test_reorder_by_move_survives_later_inserts() {
    let mut store = sample_store();
    let seen = record_operations(&mut store);
    store
        .transaction(|s| {
            s.move_node("p2", "body", Some(0))?;
            s.add_child("body", Node::text("paragraph", "lead").with_id("lead"), Some(0))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(child_ids(&store, "body"), vec!["lead", "p2", "p1"]);
    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|op| matches!(
        op,
        AtomicOperation::Move { node_id, position: Some(1), .. } if node_id == "p2"
    )));
}

#[test]
fn test_move_into_own_subtree_is_a_cycle() {
    let mut store = sample_store();
    store.begin().unwrap();

    assert!(matches!(
        store.move_node("body", "p1", None),
        Err(Error::CycleDetected { .. })
    ));
    assert!(matches!(
        store.move_node("body", "body", None),
        Err(Error::CycleDetected { .. })
    ));
    assert!(matches!(
        store.move_node("p1", "ghost", None),
        Err(Error::ParentNotFound(_))
    ));
    assert_eq!(store.pending_operations().total(), 0);
}

#[test]
fn test_move_children_keeps_their_order() {
    let mut store = sample_store();
    store.begin().unwrap();
    store
        .add_child("root", Node::container("aside").with_id("aside"), None)
        .unwrap();

    store
        .move_children("body", "aside", &["p2", "p1"], None)
        .unwrap();
    assert_eq!(child_ids(&store, "aside"), vec!["p2", "p1"]);
    assert!(child_ids(&store, "body").is_empty());

    assert!(matches!(
        store.move_children("body", "aside", &["title"], None),
        Err(Error::NotAChild { .. })
    ));
}

#[test]
fn test_reorder_requires_existing_children() {
    let mut store = sample_store();
    store.begin().unwrap();

    store.reorder_children("body", &["p2", "p1"]).unwrap();
    assert_eq!(child_ids(&store, "body"), vec!["p2", "p1"]);

    assert!(matches!(
        store.reorder_children("body", &["p2", "title"]),
        Err(Error::NotAChild { .. })
    ));
    assert!(matches!(
        store.reorder_children("ghost", &[]),
        Err(Error::ParentNotFound(_))
    ));
}

#[test]
fn test_delete_removes_the_whole_subtree() {
    let mut store = sample_store();
    let seen = record_operations(&mut store);

    store.transaction(|s| s.delete_node("body")).unwrap();

    for id in ["body", "p1", "p2"] {
        assert!(!store.base().contains(id), "{id} should be gone");
    }
    assert_eq!(child_ids(&store, "root"), vec!["title"]);
    let deletes = seen
        .lock()
        .unwrap()
        .iter()
        .filter(|op| op.kind() == OperationKind::Delete)
        .count();
    assert_eq!(deletes, 3);
}

#[test]
fn test_root_cannot_be_deleted() {
    let mut store = sample_store();
    store.begin().unwrap();

    assert!(matches!(store.delete_node("root"), Err(Error::RootDeletion(_))));
    assert!(matches!(
        store.delete_nodes(&["p1", "root"]),
        Err(Error::RootDeletion(_))
    ));
    assert!(store.contains("root"));
    assert!(store.contains("p1"));
}

#[test]
fn test_delete_nodes_skips_descendants_of_deleted_nodes() {
    let mut store = sample_store();
    store.begin().unwrap();

    let removed = store.delete_nodes(&["body", "p1", "title"]).unwrap();
    assert_eq!(removed, 2);
    assert_eq!(child_ids(&store, "root"), Vec::<String>::new());
    assert_eq!(store.node_count(), 1);
}

#[test]
fn test_copy_places_a_shallow_copy_after_the_source() {
    let mut store = sample_store();
    store.begin().unwrap();
    store
        .add_mark("p1", Mark::new("bold", 0, 2))
        .unwrap();

    let copy = store.copy_node("p1", None).unwrap();
    let node = store.get_node(&copy).unwrap().clone();

    assert_ne!(copy, "p1");
    assert_eq!(child_ids(&store, "body"), vec!["p1".to_string(), copy.to_string(), "p2".to_string()]);
    assert_eq!(node.text.as_deref(), Some("first"));
    assert_eq!(node.marks, vec![Mark::new("bold", 0, 2)]);

    let shallow = store.copy_node("body", Some("root")).unwrap();
    assert!(child_ids(&store, &shallow).is_empty());
}

#[test]
fn test_clone_with_children_rebuilds_the_subtree() {
    let mut store = sample_store();
    store.begin().unwrap();

    let clone = store.clone_node_with_children("body", Some("root")).unwrap();
    store.commit().unwrap();

    let copies = child_ids(&store, &clone);
    assert_eq!(copies.len(), 2);
    assert!(!copies.contains(&"p1".to_string()));
    let texts: Vec<_> = copies
        .iter()
        .map(|id| store.base().get(id).unwrap().text.clone().unwrap())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
    for id in &copies {
        assert_eq!(store.base().get(id).unwrap().parent_id.as_ref(), Some(&clone));
    }
    assert_eq!(child_ids(&store, "body"), vec!["p1", "p2"]);
}

#[test]
fn test_transform_changes_type_and_merges_attributes() {
    let mut store = sample_store();
    store.begin().unwrap();
    let mut attrs = Attributes::new();
    attrs.insert("level".to_string(), json!(2));

    assert!(store.transform_node("p1", "heading", Some(attrs)).unwrap().valid);
    let node = store.get_node("p1").unwrap();
    assert_eq!(node.stype, "heading");
    assert_eq!(node.attributes.get("level"), Some(&json!(2)));
    assert_eq!(node.text.as_deref(), Some("first"));

    let missing = store.transform_node("ghost", "heading", None).unwrap();
    assert!(!missing.valid);
}
