mod support;

use keyboard_types::Key;
use support::Harness;
use thread_bridge::dom::{ElementExt, EventType};
use thread_bridge::menu::Position;
use thread_bridge::{Action, BridgeConfig};

fn open_menu_on(harness: &Harness, target_id: &str) {
    let item = harness.item(target_id, false);
    assert!(harness.right_click(item, 120.0, 48.0));
}

fn titles(harness: &Harness, target_id: &str) -> Vec<String> {
    harness
        .bridge
        .lists()
        .items_for(target_id)
        .iter()
        .map(|item| harness.bridge.lists().item_title(item))
        .collect()
}

#[test]
fn right_click_reuses_a_single_menu() {
    let harness = Harness::new();

    open_menu_on(&harness, "t1");
    let first = harness.bridge.menu().menu_element().unwrap();
    let state = harness.bridge.menu().state();
    assert!(state.visible);
    assert_eq!(state.target_id, "t1");
    assert_eq!(state.target_title, "First thread");
    assert_eq!(state.position, Position { x: 120.0, y: 48.0 });
    assert_eq!(first.style_property("display").as_deref(), Some("block"));
    assert_eq!(first.style_property("left").as_deref(), Some("120px"));
    assert_eq!(first.attr("data-tid").as_deref(), Some("t1"));

    let title = harness.title_of(&harness.item("t2", false));
    assert!(harness.right_click(title, 10.0, 20.0));
    assert_eq!(harness.bridge.menu().creation_count(), 1);
    assert_eq!(harness.bridge.menu().menu_element(), Some(first));
    assert_eq!(harness.bridge.menu().state().target_id, "t2");
    assert_eq!(harness.bridge.menu().state().target_title, "Second thread");
}

#[test]
fn removed_menu_is_rebuilt_without_leaking_its_listener() {
    let harness = Harness::new();
    open_menu_on(&harness, "t1");
    let old = harness.bridge.menu().menu_element().unwrap();
    let click_listeners = harness.document.listener_count(EventType::Click);

    old.detach();
    open_menu_on(&harness, "t2");
    let rebuilt = harness.bridge.menu().menu_element().unwrap();

    assert_eq!(harness.bridge.menu().creation_count(), 2);
    assert_eq!(harness.document.listener_count(EventType::Click), click_listeners);
    assert_ne!(rebuilt, old);
    assert!(harness.document.is_connected(&rebuilt));
    assert!(!harness.document.is_connected(&old));

    harness.click(harness.menu_entry("share"));
    assert_eq!(harness.observer.actions(), vec![Action::share("t2")]);
}

#[test]
fn right_click_outside_items_keeps_native_menu() {
    let harness = Harness::new();
    let body = harness.document.body().unwrap();
    assert!(!harness.right_click(body, 1.0, 1.0));
    assert!(harness.bridge.menu().menu_element().is_none());
}

#[test]
fn rename_dispatches_trimmed_title_and_updates_copies() {
    let harness = Harness::new();
    open_menu_on(&harness, "t1");
    harness.prompter.answer("  My Thread  ");

    harness.click(harness.menu_entry("rename"));

    assert_eq!(
        harness.observer.actions(),
        vec![Action::rename("t1", "My Thread")]
    );
    assert_eq!(harness.prompter.asked(), vec!["Enter a new thread name"]);
    assert_eq!(harness.prompter.offered_defaults(), vec!["First thread"]);
    assert_eq!(titles(&harness, "t1"), vec!["My Thread", "My Thread"]);
    assert!(!harness.bridge.menu().is_visible());
}

#[test]
fn blank_or_cancelled_rename_dispatches_nothing() {
    let harness = Harness::new();

    open_menu_on(&harness, "t1");
    harness.prompter.answer("   ");
    harness.click(harness.menu_entry("rename"));

    open_menu_on(&harness, "t1");
    harness.prompter.cancel_next();
    harness.click(harness.menu_entry("rename"));

    assert!(harness.observer.actions().is_empty());
    assert_eq!(harness.observer.ready_count(), 0);
    assert_eq!(titles(&harness, "t1"), vec!["First thread", "First thread"]);
    assert!(!harness.bridge.menu().is_visible());
}

#[test]
fn share_dispatches_without_prompting() {
    let harness = Harness::new();
    open_menu_on(&harness, "t2");
    harness.click(harness.menu_entry("share"));

    assert_eq!(harness.observer.actions(), vec![Action::share("t2")]);
    assert!(harness.prompter.asked().is_empty());
    assert_eq!(harness.observer.trigger_clicks(), 0);
}

#[test]
fn confirmed_delete_removes_item_from_both_copies() {
    let harness = Harness::new();
    open_menu_on(&harness, "t1");
    harness.prompter.confirm_next(true);

    harness.click(harness.menu_entry("delete"));

    assert_eq!(harness.observer.actions(), vec![Action::delete("t1")]);
    assert_eq!(harness.prompter.asked(), vec!["Delete \"First thread\"?"]);
    assert!(harness.bridge.lists().items_for("t1").is_empty());
    assert_eq!(harness.bridge.lists().items_for("t2").len(), 2);
}

#[test]
fn declined_delete_changes_nothing() {
    let harness = Harness::new();
    open_menu_on(&harness, "t1");
    harness.prompter.confirm_next(false);

    harness.click(harness.menu_entry("delete"));

    assert!(harness.observer.actions().is_empty());
    assert_eq!(harness.bridge.lists().items_for("t1").len(), 2);
    assert!(!harness.bridge.menu().is_visible());
}

#[test]
fn delete_confirmation_names_untitled_items() {
    let harness = Harness::new();
    open_menu_on(&harness, "t3");
    assert_eq!(harness.bridge.menu().state().target_title, "");

    harness.click(harness.menu_entry("delete"));
    assert_eq!(harness.prompter.asked(), vec!["Delete \"Untitled\"?"]);
    assert!(harness.observer.actions().is_empty());
}

#[test]
fn outside_click_and_escape_hide_without_dispatching() {
    let harness = Harness::new();

    open_menu_on(&harness, "t1");
    harness.click(harness.document.body().unwrap());
    assert!(!harness.bridge.menu().is_visible());
    let menu = harness.bridge.menu().menu_element().unwrap();
    assert_eq!(menu.style_property("display").as_deref(), Some("none"));

    open_menu_on(&harness, "t2");
    harness.press(Key::Escape);
    assert!(!harness.bridge.menu().is_visible());

    assert!(harness.observer.actions().is_empty());
    assert_eq!(harness.observer.ready_count(), 0);
}

#[test]
fn click_inside_menu_outside_entries_just_hides() {
    let harness = Harness::new();
    open_menu_on(&harness, "t1");

    let menu = harness.bridge.menu().menu_element().unwrap();
    harness.click(menu);

    assert!(!harness.bridge.menu().is_visible());
    assert!(harness.observer.actions().is_empty());
}

#[test]
fn unknown_menu_entry_hides_without_dispatching() {
    let harness = Harness::new();
    open_menu_on(&harness, "t1");

    let entry = harness.menu_entry("share");
    entry.set_attr("data-act", "archive");
    harness.click(entry);

    assert!(!harness.bridge.menu().is_visible());
    assert!(harness.observer.actions().is_empty());
}

#[test]
fn rename_key_renames_selected_item() {
    let harness = Harness::new();
    harness.prompter.answer("Renamed");

    harness.press(Key::F2);

    assert_eq!(harness.prompter.offered_defaults(), vec!["Second thread"]);
    assert_eq!(
        harness.observer.actions(),
        vec![Action::rename("t2", "Renamed")]
    );
    assert_eq!(titles(&harness, "t2"), vec!["Renamed", "Renamed"]);
}

#[test]
fn rename_key_without_selection_does_nothing() {
    let harness = Harness::new();
    harness.bridge.selection().clear_selection();

    harness.press(Key::F2);

    assert!(harness.prompter.asked().is_empty());
    assert!(harness.observer.actions().is_empty());
}

#[test]
fn configured_labels_are_rendered_as_text() {
    let mut config = BridgeConfig::default();
    config.menu.share_label = "<b>Share</b> & copy".to_string();
    config.menu.rename_key = "F9".to_string();
    let harness = Harness::with_config(support::PAGE, config);

    open_menu_on(&harness, "t1");
    let entry = harness.menu_entry("share");
    assert_eq!(entry.trimmed_text(), "<b>Share</b> & copy");
    assert!(harness.query.find_within(&entry, "b").is_none());

    harness.prompter.answer("ignored");
    harness.press(Key::F2);
    assert!(harness.prompter.asked().is_empty());
}
