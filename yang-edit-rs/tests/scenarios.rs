//! End-to-end scenarios: edits applied to data, their diffs replayed,
//! reversed, merged, updated and stored as XML.

mod common;

use common::{cont, init_tracing, schema, tags, NS};
use yang_edit::constants::{ATTR_KEY, ATTR_OPERATION, ATTR_ORIG_VALUE, ATTR_VALUE, META_NS, NETCONF_NS, YANG_NS};
use yang_edit::diff::{apply_diff, changes, reverse_diff, update_diff, ChangeOp};
use yang_edit::edit::{apply_edit, EditBuilder, EditItem, Position};
use yang_edit::merge::{merge_diff, remove_owner, MergeOptions, Owner};
use yang_edit::xml::{parse_str, print_to_string};
use yang_edit::{DataTree, ErrorKind};

fn merge(target: &mut DataTree, source: &DataTree) -> bool {
    merge_diff(target, source, &MergeOptions::default()).unwrap()
}

fn summary(diff: &DataTree) -> Vec<(ChangeOp, String)> {
    let mut out: Vec<_> = changes(diff)
        .unwrap()
        .into_iter()
        .map(|c| (c.operation, diff.path(c.node)))
        .collect();
    out.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.to_string().cmp(&b.0.to_string())));
    out
}

#[test]
fn test_leaf_replace_and_reverse() {
    init_tracing();
    let schema = schema();
    let mut data = parse_str(&schema, &format!(r#"<a {NS}><b>5</b></a>"#)).unwrap();
    let edit = parse_str(&schema, &format!(r#"<a {NS}><b nc:operation="replace">7</b></a>"#)).unwrap();

    let out = apply_edit(&mut data, &edit).unwrap();
    assert!(out.changed);
    let diff = &out.diff;
    assert_eq!(diff.all_nodes().len(), 2);
    let a = diff.first_root().unwrap();
    assert_eq!(diff.attr(a, META_NS, ATTR_OPERATION), Some("none"));
    let b = diff.expect_path("/ex:a/b").unwrap();
    assert_eq!(diff.attr(b, NETCONF_NS, ATTR_OPERATION), Some("replace"));
    assert_eq!(diff.value(b), Some("7"));
    assert_eq!(diff.attr(b, META_NS, ATTR_ORIG_VALUE), Some("5"));

    let undo = reverse_diff(diff).unwrap();
    apply_diff(&mut data, &undo, false).unwrap();
    assert_eq!(data.value(data.expect_path("/ex:a/b").unwrap()), Some("5"));
}

#[test]
fn test_delete_then_create_merges_to_none() {
    init_tracing();
    let mut data = cont("", "<name>x</name><user><id>1</id><role>r</role></user>");
    let original = data.clone();

    let deleted = apply_edit(&mut data, &cont("", r#"<user nc:operation="delete"><id>1</id></user>"#)).unwrap();
    let created = apply_edit(&mut data, &cont("", r#"<user nc:operation="create"><id>1</id></user>"#)).unwrap();

    let mut merged = deleted.diff.clone();
    assert!(merge(&mut merged, &created.diff));
    let user = merged.expect_path("/ex:cont/user[id='1']").unwrap();
    assert_eq!(merged.attr(user, META_NS, ATTR_OPERATION), Some("none"));
    assert_eq!(merged.attr(user, NETCONF_NS, ATTR_OPERATION), None);
    let role = merged.expect_path("/ex:cont/user[id='1']/role").unwrap();
    assert_eq!(merged.attr(role, NETCONF_NS, ATTR_OPERATION), Some("delete"));

    // the merged diff has the effect of both edits
    let mut replay = original;
    apply_diff(&mut replay, &merged, false).unwrap();
    assert!(replay.forest_eq(&data));
}

#[test]
fn test_remove_sets_container_default() {
    init_tracing();
    let mut data = cont("", r#"<name>x</name><inner><level ncwd:default="true">1</level></inner>"#);
    let original = data.clone();
    let edit = cont("", r#"<inner><level nc:operation="remove"/></inner>"#);

    let out = apply_edit(&mut data, &edit).unwrap();
    assert!(out.changed);
    let inner = data.expect_path("/ex:cont/inner").unwrap();
    assert!(data.is_default(inner));
    assert!(data.first_child(inner).is_none());

    let diff = &out.diff;
    assert_eq!(diff.all_nodes().len(), 3);
    let diff_inner = diff.expect_path("/ex:cont/inner").unwrap();
    assert_eq!(diff.attr(diff_inner, NETCONF_NS, ATTR_OPERATION), None);
    let level = diff.expect_path("/ex:cont/inner/level").unwrap();
    assert_eq!(diff.attr(level, NETCONF_NS, ATTR_OPERATION), Some("delete"));

    let mut replay = original;
    apply_diff(&mut replay, diff, false).unwrap();
    assert!(replay.forest_eq(&data));
}

#[test]
fn test_insert_after_and_move_first() {
    init_tracing();
    let mut data = cont("", "<name>x</name><tag>a</tag><tag>b</tag><tag>c</tag>");
    let original = data.clone();

    let out = apply_edit(&mut data, &cont("", r#"<tag yang:insert="after" yang:value="b">d</tag>"#)).unwrap();
    assert_eq!(tags(&data), ["a", "b", "d", "c"]);
    let d = out.diff.expect_path("/ex:cont/tag[.='d']").unwrap();
    assert_eq!(out.diff.attr(d, NETCONF_NS, ATTR_OPERATION), Some("create"));
    assert_eq!(out.diff.attr(d, YANG_NS, ATTR_VALUE), Some("b"));
    assert_eq!(summary(&out.diff), [(ChangeOp::Created, "/ex:cont/tag[.='d']".to_string())]);

    let moved = apply_edit(&mut data, &cont("", r#"<tag yang:insert="first">c</tag>"#)).unwrap();
    assert_eq!(tags(&data), ["c", "a", "b", "d"]);
    let found = changes(&moved.diff).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].operation, ChangeOp::Moved);
    assert_eq!(found[0].previous.as_deref(), Some("d"));

    // undo both, newest first
    apply_diff(&mut data, &reverse_diff(&moved.diff).unwrap(), false).unwrap();
    apply_diff(&mut data, &reverse_diff(&out.diff).unwrap(), false).unwrap();
    assert_eq!(tags(&data), ["a", "b", "c"]);
    assert!(data.forest_eq(&original));
}

#[test]
fn test_none_edit_is_idempotent() {
    let body = r#"<name>x</name><user><id>1</id><role>r</role></user><tag>a</tag><tag>b</tag><inner><level>3</level></inner>"#;
    let mut data = cont("", body);
    let original = data.clone();
    let out = apply_edit(&mut data, &cont(r#"meta:operation="none""#, body)).unwrap();
    assert!(!out.changed);
    assert!(out.diff.is_empty());
    assert!(data.forest_eq(&original));
}

#[test]
fn test_create_then_reverse_restores_data() {
    init_tracing();
    let mut data = cont("", "<name>x</name><user><id>1</id></user><user><id>2</id></user>");
    let original = data.clone();
    let edit = cont(
        "",
        r#"<user yang:insert="after" yang:key="[id='1']"><id>5</id><role>admin</role></user><inner><level>4</level></inner>"#,
    );

    let out = apply_edit(&mut data, &edit).unwrap();
    let root = data.first_root().unwrap();
    let order: Vec<_> = data
        .children(root)
        .filter(|&c| data.name(c) == "user")
        .filter_map(|c| data.first_child(c))
        .map(|k| data.value(k).unwrap_or("").to_string())
        .collect();
    assert_eq!(order, ["1", "5", "2"]);
    let user = out.diff.expect_path("/ex:cont/user[id='5']").unwrap();
    assert_eq!(out.diff.attr(user, YANG_NS, ATTR_KEY), Some("[id='1']"));

    apply_diff(&mut data, &reverse_diff(&out.diff).unwrap(), false).unwrap();
    assert!(data.forest_eq(&original));
}

#[test]
fn test_delete_then_reverse_restores_position() {
    let mut data = cont(
        "",
        "<name>x</name><user><id>1</id></user><user><id>2</id><role>r</role></user><user><id>3</id></user>",
    );
    let original = data.clone();
    let out = apply_edit(&mut data, &cont("", r#"<user nc:operation="delete"><id>2</id></user>"#)).unwrap();
    assert!(data.find_path("/ex:cont/user[id='2']").unwrap().is_none());

    apply_diff(&mut data, &reverse_diff(&out.diff).unwrap(), false).unwrap();
    assert!(data.forest_eq(&original));
}

#[test]
fn test_reverse_of_several_deletes_restores_order() {
    let mut data = cont("", "<name>x</name><tag>a</tag><tag>b</tag><tag>c</tag>");
    let original = data.clone();
    let edit = cont(
        "",
        r#"<tag nc:operation="delete">a</tag><tag nc:operation="delete">b</tag>"#,
    );
    let out = apply_edit(&mut data, &edit).unwrap();
    assert_eq!(tags(&data), ["c"]);

    apply_diff(&mut data, &reverse_diff(&out.diff).unwrap(), false).unwrap();
    assert_eq!(tags(&data), ["a", "b", "c"]);
    assert!(data.forest_eq(&original));
}

#[test]
fn test_reverse_of_replace_prune_restores_order() {
    let body = "<name>x</name><user><id>1</id></user><user><id>2</id><role>r</role></user><tag>a</tag><tag>b</tag><tag>c</tag>";
    let mut data = cont("", body);
    let original = data.clone();
    let out = apply_edit(&mut data, &cont(r#"nc:operation="replace""#, "<name>x</name>")).unwrap();
    assert!(tags(&data).is_empty());
    assert!(data.find_path("/ex:cont/user[id='1']").unwrap().is_none());

    let undo = reverse_diff(&out.diff).unwrap();
    apply_diff(&mut data, &undo, false).unwrap();
    assert_eq!(tags(&data), ["a", "b", "c"]);
    assert!(data.forest_eq(&original));

    // the forward diff replays on top again
    apply_diff(&mut data, &out.diff, false).unwrap();
    assert!(tags(&data).is_empty());
}

#[test]
fn test_missing_anchor_is_rejected() {
    let mut data = cont("", "<name>x</name><user><id>1</id></user><tag>a</tag>");
    let original = data.clone();

    let err = apply_edit(&mut data, &cont("", r#"<user yang:insert="before"><id>2</id></user>"#)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    let err = apply_edit(&mut data, &cont("", r#"<tag yang:insert="after">z</tag>"#)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(data.forest_eq(&original));
}

#[test]
fn test_merge_of_disjoint_diffs_commutes() {
    init_tracing();
    let base = cont("", "<name>x</name><user><id>1</id></user>");
    let mut data = base.clone();
    let first = apply_edit(&mut data, &cont("", "<name>y</name>")).unwrap();
    let second = apply_edit(
        &mut data,
        &cont("", r#"<user nc:operation="create"><id>2</id><role>r</role></user>"#),
    )
    .unwrap();

    let mut ab = base.empty_like();
    merge(&mut ab, &first.diff);
    merge(&mut ab, &second.diff);
    let mut ba = base.empty_like();
    merge(&mut ba, &second.diff);
    merge(&mut ba, &first.diff);

    assert_eq!(summary(&ab), summary(&ba));
    for merged in [&ab, &ba] {
        let mut replay = base.clone();
        apply_diff(&mut replay, merged, false).unwrap();
        assert!(replay.forest_eq(&data));
    }
}

#[test]
fn test_builder_edit_applies() {
    let mut data = cont("", "<name>x</name><user><id>1</id></user><tag>a</tag><tag>c</tag>");
    let mut builder = EditBuilder::new(data.schema_rc().clone());
    builder
        .add(EditItem::new("/ex:cont/user[id='2']/role").value("admin"))
        .unwrap();
    builder
        .add(EditItem::new("/ex:cont/tag").value("b").position(Position::After("a".into())))
        .unwrap();

    let out = apply_edit(&mut data, builder.edit()).unwrap();
    assert!(out.changed);
    assert_eq!(tags(&data), ["a", "b", "c"]);
    let role = data.expect_path("/ex:cont/user[id='2']/role").unwrap();
    assert_eq!(data.value(role), Some("admin"));
}

#[test]
fn test_stored_diff_survives_xml() {
    let mut data = cont("", "<name>x</name><tag>a</tag><tag>b</tag>");
    let original = data.clone();
    let edit = cont(
        "",
        r#"<name>y</name><tag nc:operation="delete">a</tag><user><id>7</id><role>r</role></user>"#,
    );
    let out = apply_edit(&mut data, &edit).unwrap();

    let text = print_to_string(&out.diff).unwrap();
    let stored = parse_str(&schema(), &text).unwrap();
    assert_eq!(summary(&stored), summary(&out.diff));

    apply_diff(&mut data, &reverse_diff(&stored).unwrap(), false).unwrap();
    assert!(data.forest_eq(&original));
}

#[test]
fn test_update_drops_changes_already_made() {
    let base = cont("", "<name>x</name><user><id>1</id></user><user><id>2</id></user>");
    let mut data = base.clone();
    let edit = cont("", r#"<name>y</name><user nc:operation="delete"><id>2</id></user>"#);
    let mut stored = apply_edit(&mut data, &edit).unwrap().diff;

    // another writer removed user 2 from the base meanwhile
    let mut new_base = cont("", "<name>x</name><user><id>1</id></user>");
    update_diff(&mut stored, &new_base).unwrap();
    assert!(stored.find_path("/ex:cont/user[id='2']").unwrap().is_none());
    assert!(stored.find_path("/ex:cont/name").unwrap().is_some());

    apply_diff(&mut new_base, &stored, false).unwrap();
    assert!(new_base.forest_eq(&data));
}

#[test]
fn test_remove_owner_drops_writer_changes() {
    init_tracing();
    let schema = schema();
    let mut a_data = parse_str(&schema, &format!(r#"<a {NS}><b>1</b></a>"#)).unwrap();
    let a_edit = parse_str(&schema, &format!(r#"<a {NS}><b>2</b></a>"#)).unwrap();
    let a_diff = apply_edit(&mut a_data, &a_edit).unwrap().diff;

    let mut c_data = cont("", "<name>x</name>");
    let c_diff = apply_edit(&mut c_data, &cont("", "<tag>t</tag>")).unwrap().diff;

    let mut stored = a_diff.empty_like();
    let first = MergeOptions {
        owner: Some(Owner::new(100, 1)),
    };
    let second = MergeOptions {
        owner: Some(Owner::new(200, 2)),
    };
    merge_diff(&mut stored, &a_diff, &first).unwrap();
    merge_diff(&mut stored, &c_diff, &second).unwrap();
    assert_eq!(stored.roots().count(), 2);

    assert!(remove_owner(&mut stored, Owner::new(200, 2)).unwrap());
    assert_eq!(stored.roots().count(), 1);
    assert!(stored.find_path("/ex:cont").unwrap().is_none());
    let b = stored.expect_path("/ex:a/b").unwrap();
    assert_eq!(stored.value(b), Some("2"));
    assert!(!remove_owner(&mut stored, Owner::new(200, 2)).unwrap());
}
