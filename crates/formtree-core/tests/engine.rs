//! End-to-end behavior of the view-model engine over real schemas and
//! documents: materialization, edits, write-back, conditions, twin
//! families, and the container child lifecycle.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{json, Value};

use formtree_core::{ChangeKind, EditError, Root, RootOptions, TreeEvent};
use formtree_schema::{NumericKind, SchemaNode, Suggestion};

#[test]
fn leaf_edit_propagates_to_document() {
    let schema = SchemaNode::block(
        "server",
        vec![
            SchemaNode::string("host").required().into_arc(),
            SchemaNode::number("port", NumericKind::Int).into_arc(),
        ],
    )
    .into_arc();
    let mut root = load(&schema, json!({"host": "localhost"}));

    let tree = root.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    let port = tree.find_child(block, "port").expect("port child");
    tree.set_value(port, json!(8080)).expect("writable tree");

    assert_eq!(root.document(), &json!({"host": "localhost", "port": 8080}));
}

#[test]
fn load_populates_required_defaults_and_keeps_residual_data() {
    let schema = SchemaNode::block(
        "config",
        vec![
            SchemaNode::number("count", NumericKind::Int).into_arc(),
            SchemaNode::string("name").required().into_arc(),
        ],
    )
    .into_arc();
    let root = load(&schema, json!({"count": 0, "legacy": {"kept": true}}));

    // `count` is present with its default and stays; `legacy` matches no
    // declared child and rides along untouched; required `name` appears.
    assert_eq!(
        root.document(),
        &json!({"count": 0, "legacy": {"kept": true}, "name": ""})
    );
}

#[test]
fn no_edit_load_changes_nothing_without_required_children() {
    let schema = SchemaNode::block(
        "config",
        vec![SchemaNode::string("label").into_arc()],
    )
    .into_arc();
    let document = json!({"unrelated": [1, 2, 3]});
    let root = load(&schema, document.clone());
    assert_eq!(root.document(), &document);
}

#[test]
fn ensure_value_repairs_only_mismatched_types() {
    let schema = SchemaNode::number("port", NumericKind::Int).into_arc();
    let mut root = load(&schema, json!("not-a-number"));
    let events = record(root.tree_mut());

    let tree = root.tree_mut();
    let node = tree.selected_root().expect("a selected root");
    assert!(tree.is_invalid_value_type(node));

    tree.ensure_value(node).expect("writable tree");
    assert!(!tree.is_invalid_value_type(node));
    assert_eq!(tree.value(node), &json!(0));
    assert_eq!(value_events(&events).len(), 1);

    // Idempotent: a matching value is left alone.
    tree.ensure_value(node).expect("writable tree");
    assert_eq!(value_events(&events).len(), 1);
}

#[test]
fn discard_resets_even_matching_values() {
    let schema = SchemaNode::string("mode")
        .with_default(json!("auto"))
        .into_arc();
    let mut root = load(&schema, json!("manual"));
    let tree = root.tree_mut();
    let node = tree.selected_root().expect("a selected root");

    tree.discard_to_default(node).expect("writable tree");
    assert_eq!(tree.value(node), &json!("auto"));
    assert_eq!(root.document(), &json!("auto"));
}

#[test]
fn condition_reacts_to_identifier_writes() {
    let schema = SchemaNode::block(
        "settings",
        vec![
            SchemaNode::string("proxy")
                .with_condition(json!(["==", ["$", "advanced"], [true]]))
                .into_arc(),
            SchemaNode::bool("advanced")
                .with_identifier("advanced")
                .into_arc(),
        ],
    )
    .into_arc();
    let mut root = load(&schema, json!({}));
    let events = record(root.tree_mut());

    let tree = root.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    let proxy = tree.find_child(block, "proxy").expect("proxy child");
    let advanced = tree.find_child(block, "advanced").expect("advanced child");

    assert!(!tree.is_condition_met(proxy), "false default leaves it unmet");

    tree.set_value(advanced, json!(true)).expect("writable tree");
    assert!(tree.is_condition_met(proxy));
    let condition_flips: Vec<_> = events
        .borrow()
        .iter()
        .filter(|e| matches!(e.kind, ChangeKind::ConditionMet(_)))
        .cloned()
        .collect();
    assert_eq!(condition_flips.len(), 1);
    assert_eq!(condition_flips[0].node, proxy);

    // The dependent node's own value was never written.
    assert_eq!(tree.value(proxy), &json!(""));

    tree.set_value(advanced, json!(false)).expect("writable tree");
    assert!(!tree.is_condition_met(proxy));
}

#[test]
fn malformed_condition_degrades_to_unmet() {
    let schema = SchemaNode::block(
        "settings",
        vec![SchemaNode::string("x")
            .with_condition(json!(["bogus-op", [1], [2]]))
            .into_arc()],
    )
    .into_arc();
    let root = load(&schema, json!({}));
    let tree = root.tree();
    let block = tree.selected_root().expect("a selected root");
    let x = tree.find_child(block, "x").expect("x child");
    assert!(!tree.is_condition_met(x));
}

#[test]
fn twin_family_selects_by_value_type() {
    let schema = speed_schema();
    let root = load(&schema, json!({"speed": "fast"}));
    let tree = root.tree();
    let block = tree.selected_root().expect("a selected root");
    let members: Vec<_> = tree.children(block);
    assert_eq!(members.len(), 2);

    let fid = tree.family_of(members[0]).expect("family");
    assert_eq!(tree.family_of(members[1]), Some(fid));
    let selected = tree.selected_member(fid).expect("a selection");
    assert_eq!(selected, members[1], "string member wins over the number");
    assert_eq!(tree.value(selected), &json!("fast"));
    assert_eq!(tree.value(members[0]), &Value::Null, "loser stays parked");
}

#[test]
fn twin_switch_parks_and_restores_values() {
    let schema = speed_schema();
    let mut root = load(&schema, json!({"speed": "fast"}));
    let tree = root.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    let members = tree.children(block);
    let (number, string) = (members[0], members[1]);

    tree.switch_twin(number).expect("member of a family");
    let fid = tree.family_of(number).expect("family");
    assert_eq!(tree.selected_member(fid), Some(number));
    // First selection of an unseen member installs its schema default,
    // which is not savable here, so the shared key disappears.
    assert_eq!(tree.value(number), &json!(0));
    assert_eq!(root.document(), &json!({}));

    let tree = root.tree_mut();
    tree.switch_twin(string).expect("member of a family");
    assert_eq!(tree.value(string), &json!("fast"), "parked value survives");
    assert_eq!(root.document(), &json!({"speed": "fast"}));
}

#[test]
fn twin_switch_collapses_the_deselected_member() {
    let schema = SchemaNode::block(
        "root",
        vec![
            SchemaNode::block("engine", vec![SchemaNode::string("kind").into_arc()]).into_arc(),
            SchemaNode::string("engine").into_arc(),
        ],
    )
    .into_arc();
    let mut root = load(&schema, json!({"engine": {"kind": "v8"}}));
    let events = record(root.tree_mut());

    let tree = root.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    let members = tree.children(block);
    let (block_member, string_member) = (members[0], members[1]);
    let fid = tree.family_of(block_member).expect("family");
    assert_eq!(tree.selected_member(fid), Some(block_member));

    tree.set_expanded(block_member, true);
    tree.switch_twin(string_member).expect("member of a family");
    assert!(!tree.is_expanded(block_member));
    assert!(events
        .borrow()
        .iter()
        .any(|e| e.node == block_member && e.kind == ChangeKind::Expanded(false)));
    assert!(events
        .borrow()
        .iter()
        .any(|e| matches!(e.kind, ChangeKind::TwinSwitched { .. })));
}

#[test]
fn type_changing_edit_moves_the_twin_selection() {
    let schema = speed_schema();
    let mut root = load(&schema, json!({"speed": 3}));
    let tree = root.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    let members = tree.children(block);
    let (number, string) = (members[0], members[1]);
    let fid = tree.family_of(number).expect("family");
    assert_eq!(tree.selected_member(fid), Some(number));

    // Give the string member a real parked value, then come back.
    tree.switch_twin(string).expect("member of a family");
    tree.set_value(string, json!("fast")).expect("writable");
    tree.switch_twin(number).expect("member of a family");
    assert_eq!(tree.selected_member(fid), Some(number));

    // A mismatching write on the active member re-runs selection, and the
    // string member's parked value now type-matches.
    tree.set_value(number, json!("slow")).expect("writable");
    assert_eq!(tree.selected_member(fid), Some(string));
    assert_eq!(tree.value(string), &json!("fast"));
    assert_eq!(root.document(), &json!({"speed": "fast"}));
}

#[test]
fn top_level_twin_picks_the_matching_representation() {
    let compact = SchemaNode::string("job").into_arc();
    let expanded = SchemaNode::block(
        "job",
        vec![SchemaNode::string("command").required().into_arc()],
    )
    .into_arc();
    let root = Root::load(
        &[compact, expanded],
        json!({"command": "make"}),
        RootOptions::default(),
    );
    let tree = root.tree();
    let selected = tree.selected_root().expect("a selected root");
    assert_eq!(selected, tree.roots()[1], "object document picks the block");
    assert_eq!(root.document(), &json!({"command": "make"}));
}

#[test]
fn array_materializes_per_element_prefabs() {
    let schema = SchemaNode::array(
        "entries",
        vec![
            SchemaNode::string("text").into_arc(),
            SchemaNode::block("pair", vec![SchemaNode::number("y", NumericKind::Int).into_arc()])
                .into_arc(),
        ],
    )
    .into_arc();
    let root = load(&schema, json!(["x", {"y": 1}]));
    let tree = root.tree();
    let arr = tree.selected_root().expect("a selected root");
    let children = tree.children(arr);
    assert_eq!(children.len(), 2);
    assert_eq!(tree.schema(children[0]).name, "text");
    assert_eq!(tree.schema(children[1]).name, "pair");
    assert_eq!(tree.index(children[1]), Some(1));
}

#[test]
fn add_then_remove_restores_storage() {
    let schema = SchemaNode::array("items", vec![SchemaNode::string("item").into_arc()]).into_arc();
    let mut root = load(&schema, json!(["a"]));
    let tree = root.tree_mut();
    let arr = tree.selected_root().expect("a selected root");

    let added = tree.add_child(arr, None, None).expect("sole prefab");
    assert_eq!(root.document(), &json!(["a", ""]));

    let tree = root.tree_mut();
    tree.remove_child(arr, added).expect("added child exists");
    assert_eq!(root.document(), &json!(["a"]));
}

#[test]
fn removing_a_middle_element_reindexes_the_rest() {
    let schema = SchemaNode::array("items", vec![SchemaNode::string("item").into_arc()]).into_arc();
    let mut root = load(&schema, json!(["a", "b", "c"]));
    let tree = root.tree_mut();
    let arr = tree.selected_root().expect("a selected root");
    let middle = tree.children(arr)[1];

    tree.remove_child(arr, middle).expect("child of this array");
    assert_eq!(root.document(), &json!(["a", "c"]));
    let tree = root.tree();
    let survivors = tree.children(arr);
    assert_eq!(tree.index(survivors[0]), Some(0));
    assert_eq!(tree.index(survivors[1]), Some(1));
    assert_eq!(tree.value(survivors[1]), &json!("c"));
}

#[test]
fn single_type_array_remembers_its_prefab() {
    let schema = SchemaNode::array(
        "values",
        vec![
            SchemaNode::string("text").into_arc(),
            SchemaNode::number("num", NumericKind::Int).into_arc(),
        ],
    )
    .single_prefab()
    .into_arc();
    let mut root = load(&schema, json!([]));
    let tree = root.tree_mut();
    let arr = tree.selected_root().expect("a selected root");

    assert!(matches!(
        tree.add_child(arr, None, None),
        Err(EditError::PrefabChoiceRequired)
    ));
    let first = tree.add_child(arr, Some(1), None).expect("valid choice");
    let second = tree.add_child(arr, None, None).expect("remembered choice");
    assert_eq!(tree.schema(second).name, "num");
    assert_eq!(root.document(), &json!([0, 0]));

    // Emptying the array forgets the choice.
    let tree = root.tree_mut();
    tree.remove_child(arr, first).expect("member");
    tree.remove_child(arr, second).expect("member");
    assert!(matches!(
        tree.add_child(arr, None, None),
        Err(EditError::PrefabChoiceRequired)
    ));
}

#[test]
fn out_of_range_prefab_choice_is_rejected() {
    let schema = SchemaNode::array("items", vec![SchemaNode::string("item").into_arc()]).into_arc();
    let mut root = load(&schema, json!([]));
    let tree = root.tree_mut();
    let arr = tree.selected_root().expect("a selected root");
    assert!(matches!(
        tree.add_child(arr, Some(3), None),
        Err(EditError::NoSuchPrefab(3))
    ));
}

#[test]
fn keyed_array_names_and_renames_members() {
    let schema = SchemaNode::array(
        "env",
        vec![SchemaNode::string("var").dynamic_name().into_arc()],
    )
    .keyed()
    .into_arc();
    let mut root = load(&schema, json!({}));
    let tree = root.tree_mut();
    let map = tree.selected_root().expect("a selected root");

    let a = tree.add_child(map, None, Some("PATH")).expect("fresh name");
    let b = tree.add_child(map, None, None).expect("generated name");
    assert_eq!(tree.dynamic_name(b), Some("var"));
    assert!(matches!(
        tree.add_child(map, None, Some("PATH")),
        Err(EditError::NameCollision { .. })
    ));

    // Collision rejected with the original name intact.
    assert!(matches!(
        tree.rename(b, "PATH"),
        Err(EditError::NameCollision { .. })
    ));
    assert_eq!(tree.dynamic_name(b), Some("var"));
    assert_eq!(root.document(), &json!({"PATH": "", "var": ""}));

    let tree = root.tree_mut();
    tree.rename(b, "HOME").expect("fresh name");
    assert_eq!(tree.dynamic_name(b), Some("HOME"));
    tree.set_value(a, json!("/usr/bin")).expect("writable");
    assert_eq!(root.document(), &json!({"PATH": "/usr/bin", "HOME": ""}));
}

#[test]
fn schema_named_children_are_not_renamable() {
    let schema = SchemaNode::block("cfg", vec![SchemaNode::string("host").into_arc()]).into_arc();
    let mut root = load(&schema, json!({}));
    let tree = root.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    let host = tree.find_child(block, "host").expect("host child");
    assert!(matches!(tree.rename(host, "other"), Err(EditError::NotRenamable)));
}

#[test]
fn uniform_block_appends_default_elements() {
    let element = SchemaNode::number("port", NumericKind::Int).into_arc();
    let schema = SchemaNode::block_array("ports", element).into_arc();
    let mut root = load(&schema, json!([80, 443]));
    let tree = root.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    assert_eq!(tree.children(block).len(), 2);

    let added = tree.add_child(block, None, None).expect("uniform element");
    assert_eq!(tree.index(added), Some(2));
    assert_eq!(root.document(), &json!([80, 443, 0]));
}

#[test]
fn read_only_rejects_every_mutation() {
    let schema = SchemaNode::array("items", vec![SchemaNode::string("item").into_arc()]).into_arc();
    let options = RootOptions {
        read_only: true,
        ..RootOptions::default()
    };
    let mut root = Root::load(&[schema], json!(["a"]), options);
    let tree = root.tree_mut();
    let arr = tree.selected_root().expect("a selected root");
    let child = tree.children(arr)[0];

    assert!(matches!(tree.set_value(child, json!("b")), Err(EditError::ReadOnly)));
    assert!(matches!(tree.add_child(arr, None, None), Err(EditError::ReadOnly)));
    assert!(matches!(tree.remove_child(arr, child), Err(EditError::ReadOnly)));
    assert!(matches!(tree.rename(child, "x"), Err(EditError::ReadOnly)));
    assert_eq!(root.document(), &json!(["a"]));
}

#[test]
fn mandatory_suggestions_flag_stray_values() {
    let schema = SchemaNode::enumeration(
        "level",
        vec![
            Suggestion::plain(json!("debug")),
            Suggestion::plain(json!("info")),
        ],
    )
    .into_arc();
    let root = load(&schema, json!("verbose"));
    let tree = root.tree();
    let node = tree.selected_root().expect("a selected root");
    assert!(!tree.is_invalid_value_type(node), "a string is the right type");
    assert!(tree.is_invalid_value(node), "but not an allowed one");
}

#[test]
fn registry_suggestions_merge_after_schema_ones() {
    let schema = SchemaNode::string("target")
        .with_suggestions(vec![Suggestion::plain(json!("static"))], false)
        .with_suggestion_key("targets")
        .into_arc();
    let mut root = load(&schema, json!(""));
    root.suggestions_mut().install_provider("targets", |_| {
        vec![
            Suggestion::plain(json!("static")),
            Suggestion::plain(json!("dynamic")),
        ]
    });
    let node = root.tree().selected_root().expect("a selected root");
    let merged = root.suggestions_for(node);
    let values: Vec<_> = merged.iter().map(|s| s.value.clone()).collect();
    assert_eq!(values, vec![json!("static"), json!("dynamic")]);
}

#[test]
fn nested_document_reads_host_identifiers() {
    let host_schema = SchemaNode::block(
        "host",
        vec![SchemaNode::bool("debug").with_identifier("debug").into_arc()],
    )
    .into_arc();
    let host = Root::load(&[host_schema], json!({"debug": true}), RootOptions::default());

    let nested_schema = SchemaNode::block(
        "inner",
        vec![SchemaNode::string("trace")
            .with_condition(json!(["$", "debug"]))
            .into_arc()],
    )
    .into_arc();
    let nested = Root::load_nested(&host, &[nested_schema], json!({}), RootOptions::default());
    let tree = nested.tree();
    let block = tree.selected_root().expect("a selected root");
    let trace = tree.find_child(block, "trace").expect("trace child");
    assert!(tree.is_condition_met(trace), "host's identifier is visible");
}

#[test]
fn nested_teardown_leaves_host_subscriptions_intact() {
    let host_schema = SchemaNode::block(
        "host",
        vec![
            SchemaNode::bool("debug").with_identifier("debug").into_arc(),
            SchemaNode::string("proxy")
                .with_condition(json!(["$", "debug"]))
                .into_arc(),
        ],
    )
    .into_arc();
    let mut host = Root::load(&[host_schema], json!({}), RootOptions::default());

    // Nested elements condition on the host's identifier; their arena
    // indices overlap the host's.
    let nested_schema = SchemaNode::block(
        "inner",
        vec![SchemaNode::array(
            "items",
            vec![SchemaNode::string("item")
                .with_condition(json!(["$", "debug"]))
                .into_arc()],
        )
        .into_arc()],
    )
    .into_arc();
    let mut nested = Root::load_nested(
        &host,
        &[nested_schema],
        json!({"items": ["a", "b", "c"]}),
        RootOptions::default(),
    );
    let inner = nested.tree().selected_root().expect("nested root");
    let items = nested.tree().find_child(inner, "items").expect("items");
    nested.tree_mut().set_value(items, json!([])).expect("writable");

    let tree = host.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    let proxy = tree.find_child(block, "proxy").expect("proxy child");
    let debug = tree.find_child(block, "debug").expect("debug child");
    assert!(!tree.is_condition_met(proxy));
    tree.set_value(debug, json!(true)).expect("writable");
    assert!(
        tree.is_condition_met(proxy),
        "host condition still reacts after the nested tree tore down"
    );
}

#[test]
fn declared_block_children_cannot_be_removed() {
    let schema = speed_schema();
    let mut root = load(&schema, json!({"speed": 3}));
    let tree = root.tree_mut();
    let block = tree.selected_root().expect("a selected root");
    let number = tree.children(block)[0];

    assert!(matches!(
        tree.remove_child(block, number),
        Err(EditError::NotAContainer)
    ));
    // Rejected removal leaves the family and storage untouched.
    assert_eq!(tree.children(block).len(), 2);
    let fid = tree.family_of(number).expect("family");
    assert_eq!(tree.selected_member(fid), Some(number));
    assert_eq!(root.document(), &json!({"speed": 3}));
}

#[test]
#[should_panic(expected = "registered twice")]
fn identifier_bearing_prefab_cannot_repeat() {
    let schema = SchemaNode::array(
        "items",
        vec![SchemaNode::string("item").with_identifier("item").into_arc()],
    )
    .into_arc();
    let _ = load(&schema, json!(["a", "b"]));
}

#[test]
fn listeners_can_be_detached() {
    let schema = SchemaNode::string("name").into_arc();
    let mut root = load(&schema, json!(""));
    let events = record(root.tree_mut());

    let tree = root.tree_mut();
    let node = tree.selected_root().expect("a selected root");
    tree.set_value(node, json!("a")).expect("writable");
    let seen = events.borrow().len();
    assert!(seen > 0);

    // Probe ids start at 1 and this is the only listener.
    assert!(tree.off_change(1));
    tree.set_value(node, json!("b")).expect("writable");
    assert_eq!(events.borrow().len(), seen);
}

// ---------------------------------------------------------------- fixtures

fn load(schema: &Arc<SchemaNode>, document: Value) -> Root {
    Root::load(
        std::slice::from_ref(schema),
        document,
        RootOptions::default(),
    )
}

/// Attaches a recording listener and returns the shared event log.
fn record(tree: &mut formtree_core::DocumentTree) -> Rc<RefCell<Vec<TreeEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    tree.on_change(move |event| sink.borrow_mut().push(event));
    events
}

fn value_events(events: &Rc<RefCell<Vec<TreeEvent>>>) -> Vec<TreeEvent> {
    events
        .borrow()
        .iter()
        .filter(|e| matches!(e.kind, ChangeKind::Value { .. }))
        .cloned()
        .collect()
}

/// A block declaring two same-named alternatives: a number `speed` and a
/// string `speed`.
fn speed_schema() -> Arc<SchemaNode> {
    SchemaNode::block(
        "vehicle",
        vec![
            SchemaNode::number("speed", NumericKind::Int).into_arc(),
            SchemaNode::string("speed").into_arc(),
        ],
    )
    .into_arc()
}
