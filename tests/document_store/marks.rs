//! Mark engine through the store: single-node algebra and cross-node ranges.

use crate::common::*;
use proptest::prelude::*;
use serde_json::json;
use verso::{Attributes, Error, TextPosition, TextRange};

fn bold(start: usize, end: usize) -> (String, usize, usize) {
    ("bold".to_string(), start, end)
}

#[test]
fn test_apply_then_toggle_clears_the_mark() {
    let mut store = sample_store();
    store.begin().unwrap();
    let range = TextRange::within("title", 0, 5);

    store.apply_mark(&range, &Mark::full("bold")).unwrap();
    assert_eq!(mark_triples(&store, "title"), vec![bold(0, 5)]);
    assert!(store.is_mark_active(&range, "bold").unwrap());

    store.toggle_mark(&range, "bold", None).unwrap();
    assert!(mark_triples(&store, "title").is_empty());
    assert!(!store.is_mark_active(&range, "bold").unwrap());
}

#[test]
fn test_overlapping_marks_merge_on_commit() {
    let mut store = sample_store();
    store
        .transaction(|s| {
            s.add_mark("title", Mark::new("bold", 0, 5))?;
            s.add_mark("title", Mark::new("bold", 3, 8))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(
        store.base().get("title").unwrap().marks,
        vec![Mark::new("bold", 0, 8)]
    );
}

#[test]
fn test_touching_marks_merge_keeping_the_first_attributes() {
    let mut store = sample_store();
    store.begin().unwrap();
    store
        .add_mark("title", Mark::new("link", 0, 5).with_attr("href", json!("a")))
        .unwrap();
    store
        .add_mark("title", Mark::new("link", 5, 11).with_attr("href", json!("b")))
        .unwrap();

    let marks = &store.get_node("title").unwrap().marks;
    assert_eq!(marks.len(), 1);
    assert_eq!(marks[0].range, Some(MarkRange::new(0, 11)));
    let at = store.marks_at("title", 8).unwrap();
    assert_eq!(at[0].attrs.get("href"), Some(&json!("a")));
}

#[test]
fn test_remove_mark_splits_around_the_range() {
    let mut store = sample_store();
    store.begin().unwrap();
    store.add_mark("title", Mark::new("bold", 0, 11)).unwrap();

    store.remove_mark("title", MarkRange::new(5, 6), "bold").unwrap();
    assert_eq!(mark_triples(&store, "title"), vec![bold(0, 5), bold(6, 11)]);
}

#[test]
fn test_out_of_bounds_range_leaves_the_node_untouched() {
    let mut store = sample_store();
    store.begin().unwrap();

    let changed = store
        .apply_mark(&TextRange::within("p1", 2, 40), &Mark::full("bold"))
        .unwrap();

    assert_eq!(changed, 0);
    assert!(mark_triples(&store, "p1").is_empty());
    assert_eq!(store.pending_operations().total(), 0);
}

#[test]
fn test_cross_node_apply_follows_document_order() {
    let mut store = sample_store();
    store.begin().unwrap();
    let range = TextRange::new(TextPosition::new("title", 6), TextPosition::new("p1", 3));

    let spans = store.resolve_text_range(&range).unwrap();
    assert_eq!(
        spans,
        vec![
            (NodeId::new("title"), MarkRange::new(6, 11)),
            (NodeId::new("p1"), MarkRange::new(0, 3)),
        ]
    );

    assert_eq!(store.apply_mark(&range, &Mark::full("italic")).unwrap(), 2);
    store.commit().unwrap();

    let italic = |id: &str| store.base().get(id).unwrap().marks.clone();
    assert_eq!(italic("title"), vec![Mark::new("italic", 6, 11)]);
    assert_eq!(italic("p1"), vec![Mark::new("italic", 0, 3)]);
    assert!(italic("p2").is_empty());
}

#[test]
fn test_cross_node_toggle_decides_once_for_the_whole_range() {
    let mut store = sample_store();
    store.begin().unwrap();
    store.add_mark("p2", Mark::new("bold", 0, 2)).unwrap();
    let range = TextRange::new(TextPosition::new("p1", 0), TextPosition::new("p2", 6));

    store.toggle_mark(&range, "bold", None).unwrap();
    assert!(mark_triples(&store, "p1").is_empty());
    assert!(mark_triples(&store, "p2").is_empty());

    let mut attrs = Attributes::new();
    attrs.insert("weight".to_string(), json!(700));
    store.toggle_mark(&range, "bold", Some(attrs)).unwrap();
    assert_eq!(mark_triples(&store, "p1"), vec![bold(0, 5)]);
    assert_eq!(mark_triples(&store, "p2"), vec![bold(0, 6)]);
    assert_eq!(
        store.marks_at("p2", 3).unwrap()[0].attrs.get("weight"),
        Some(&json!(700))
    );
}

#[test]
fn test_reversed_range_resolves_to_nothing() {
    let mut store = sample_store();
    store.begin().unwrap();
    let range = TextRange::new(TextPosition::new("p2", 0), TextPosition::new("title", 3));

    assert!(store.resolve_text_range(&range).unwrap().is_empty());
    assert_eq!(store.apply_mark(&range, &Mark::full("bold")).unwrap(), 0);
    assert!(!store.is_mark_active(&range, "bold").unwrap());
}

#[test]
fn test_unknown_node_in_range_is_an_error() {
    let mut store = sample_store();
    store.begin().unwrap();
    let range = TextRange::new(TextPosition::new("title", 0), TextPosition::new("ghost", 1));

    assert!(matches!(
        store.apply_mark(&range, &Mark::full("bold")),
        Err(Error::NodeNotFound(_))
    ));
}

#[test]
fn test_mark_edits_emit_node_updates_on_commit() {
    let mut store = sample_store();
    let seen = record_operations(&mut store);

    store
        .transaction(|s| {
            s.apply_mark(&TextRange::within("p1", 0, 5), &Mark::full("code"))?;
            Ok(())
        })
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind(), OperationKind::Update);
    assert_eq!(seen[0].node_id(), "p1");
}

proptest! {
    #[test]
    fn prop_toggle_twice_restores_the_marks(
        italic in (0usize..11, 0usize..11),
        start in 0usize..11,
        len in 1usize..11,
    ) {
        let end = (start + len).min(11);
        prop_assume!(start < end);

        let mut store = sample_store();
        store.begin().unwrap();
        let (a, b) = (italic.0.min(italic.1), italic.0.max(italic.1));
        store.add_mark("title", Mark::new("italic", a, b)).unwrap();
        let before = store.get_node("title").unwrap().marks.clone();

        let range = TextRange::within("title", start, end);
        store.toggle_mark(&range, "bold", None).unwrap();
        prop_assert!(store.is_mark_active(&range, "bold").unwrap());
        store.toggle_mark(&range, "bold", None).unwrap();

        prop_assert_eq!(&store.get_node("title").unwrap().marks, &before);
    }
}
