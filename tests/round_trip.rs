//! Capture -> wire -> replay round trips.

use dom::mutation::Delta;
use test_support::{assert_round_trip, Recorder, Replayer};

#[test]
fn structural_edits_round_trip() {
    let mut recorder = Recorder::new();
    let root = recorder.root;
    let main = recorder.append_element(root, "main");
    let list = recorder.append_element(main, "ul");
    let first = recorder.append_element(list, "li");
    recorder.append_text(first, "one");
    recorder.emit().unwrap();

    let second = recorder.append_element(list, "li");
    recorder.append_text(second, "two");
    recorder.insert_element_before(list, "li", first);
    recorder.emit().unwrap();

    recorder.remove_node(first);
    recorder.move_node(second, main);
    recorder.emit().unwrap();

    let mut replayer = Replayer::new(recorder.root_id());
    replayer.apply_all(recorder.deltas());
    replayer.flush();
    assert_round_trip(&recorder, &replayer);
}

#[test]
fn content_edits_round_trip() {
    let mut recorder = Recorder::new();
    let root = recorder.root;
    let article = recorder.append_element(root, "article");
    let heading = recorder.append_element(article, "h1");
    let title = recorder.append_text(heading, "draft");
    recorder.emit().unwrap();

    recorder.set_text(title, "final");
    recorder.set_attribute(article, "data-state", Some("ready"));
    recorder.set_style_property(article, "color", "red", false);
    recorder.set_style_property(article, "display", "none", true);
    recorder.emit().unwrap();

    recorder.remove_style_property(article, "color");
    recorder.set_attribute(article, "data-state", None);
    recorder.emit().unwrap();

    let mut replayer = Replayer::new(recorder.root_id());
    replayer.apply_all(recorder.deltas());
    replayer.flush();
    assert_round_trip(&recorder, &replayer);
    assert!(replayer.applier.diagnostics().is_empty());
}

#[test]
fn add_order_within_a_delta_does_not_matter() {
    let mut recorder = Recorder::new();
    let root = recorder.root;
    let div = recorder.append_element(root, "div");
    let span = recorder.append_element(div, "span");
    recorder.append_text(span, "deep");
    recorder.append_element(div, "em");
    let delta = recorder.emit().unwrap();

    let mut reversed = delta.clone();
    reversed.adds.reverse();
    for delta in [delta, reversed] {
        let mut replayer = Replayer::new(recorder.root_id());
        replayer.apply(&delta);
        replayer.flush();
        assert_round_trip(&recorder, &replayer);
        assert!(replayer.applier.diagnostics().is_empty());
    }
}

#[test]
fn deltas_survive_json_serialization() {
    let mut recorder = Recorder::new();
    let root = recorder.root;
    let form = recorder.append_element(root, "form");
    let input = recorder.append_element(form, "input");
    recorder.set_attribute(input, "value", Some("hello"));
    recorder.set_style_property(form, "margin", "0", false);
    recorder.emit().unwrap();
    recorder.remove_node(input);
    recorder.emit().unwrap();

    let wire: Vec<Delta> = recorder
        .deltas()
        .iter()
        .map(|delta| {
            let json = serde_json::to_string(delta).unwrap();
            serde_json::from_str(&json).unwrap()
        })
        .collect();
    let mut replayer = Replayer::new(recorder.root_id());
    replayer.apply_all(&wire);
    replayer.flush();
    assert_round_trip(&recorder, &replayer);
}

#[test]
fn sibling_arriving_in_a_later_delta_unparks_the_add() {
    let mut recorder = Recorder::new();
    let root = recorder.root;
    let anchor = recorder.append_element(root, "p");
    let first = recorder.emit().unwrap();
    recorder.insert_element_before(root, "aside", anchor);
    let second = recorder.emit().unwrap();

    // deliver out of order: the insert-before references a node the
    // replayer has not seen yet
    let mut replayer = Replayer::new(recorder.root_id());
    replayer.apply(&second);
    // parked, not dropped: only the root is mapped so far
    assert_eq!(replayer.ctx.mirror.len(), 1);
    replayer.apply(&first);
    replayer.flush();
    assert_round_trip(&recorder, &replayer);
    assert!(replayer.applier.diagnostics().is_empty());
}

#[test]
fn removed_subtrees_leave_no_mappings_behind() {
    let mut recorder = Recorder::new();
    let root = recorder.root;
    let div = recorder.append_element(root, "div");
    recorder.append_text(div, "x");
    recorder.emit().unwrap();
    let div_id = recorder.id_of(div);
    recorder.remove_node(div);
    recorder.emit().unwrap();

    let mut replayer = Replayer::new(recorder.root_id());
    replayer.apply_all(recorder.deltas());
    replayer.flush();
    assert_round_trip(&recorder, &replayer);
    assert!(replayer.ctx.mirror.get(div_id).is_none());
}
