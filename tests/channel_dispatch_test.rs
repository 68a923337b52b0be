mod support;

use std::cell::RefCell;
use std::rc::Rc;

use support::{run, settle, Harness};
use thread_bridge::channel::{ChannelName, ChannelSink, HiddenChannelWriter};
use thread_bridge::dom::{DomEvent, EventType};
use thread_bridge::query::DeepQuery;
use thread_bridge::{Action, ActionSink, BridgeConfig, ChannelDispatcher, Delivery, Document};

#[test]
fn repeated_open_of_same_item_is_observed_twice() {
    run(async {
        let harness = Harness::new();

        let first = harness.bridge.selection().open("t1", false);
        assert_eq!(first.dispatch.await.unwrap(), Delivery::Sent);
        let second = harness.bridge.selection().open("t1", false);
        assert_eq!(second.dispatch.await.unwrap(), Delivery::Sent);

        assert_eq!(harness.observer.ready_count(), 2);
        assert_eq!(harness.observer.trigger_clicks(), 2);
        assert_eq!(
            harness.observer.actions(),
            vec![Action::open("t1"), Action::open("t1")]
        );
    });
}

#[test]
fn setting_the_same_kind_without_reset_is_coalesced() {
    let harness = Harness::new();
    let writer = HiddenChannelWriter::new(harness.query.clone(), BridgeConfig::default().channels);

    writer.write_value(ChannelName::Id, "t1");
    writer.write_value(ChannelName::Kind, "share");
    writer.write_value(ChannelName::Kind, "share");
    assert_eq!(harness.observer.ready_count(), 1);

    let dispatcher = ChannelDispatcher::new(writer);
    dispatcher.dispatch(&Action::share("t1"));
    assert_eq!(harness.observer.ready_count(), 2);
}

#[test]
fn writer_emits_input_then_change_on_the_inner_textarea() {
    let harness = Harness::new();
    let writer = HiddenChannelWriter::new(harness.query.clone(), BridgeConfig::default().channels);
    let seen = Rc::new(RefCell::new(Vec::new()));

    let root = writer.channel_root(ChannelName::Argument).unwrap();
    for event_type in [EventType::Input, EventType::Change] {
        let seen = Rc::clone(&seen);
        harness.document.add_event_listener(
            &root,
            event_type,
            Rc::new(move |event: &DomEvent| {
                let tag = event
                    .target
                    .as_element()
                    .map(|element| element.name.local.to_string());
                seen.borrow_mut().push((event.event_type, tag, event.bubbles));
            }),
        );
    }

    assert!(writer.write_value(ChannelName::Argument, "hello"));
    assert_eq!(writer.read_value(ChannelName::Argument).as_deref(), Some("hello"));
    assert_eq!(
        *seen.borrow(),
        vec![
            (EventType::Input, Some("textarea".to_string()), true),
            (EventType::Change, Some("textarea".to_string()), true),
        ]
    );
}

#[test]
fn missing_channels_are_dropped_silently() {
    let document = Rc::new(Document::parse("<body><gradio-app></gradio-app></body>"));
    let query = DeepQuery::new(Rc::clone(&document), "gradio-app");
    let writer = HiddenChannelWriter::new(query, BridgeConfig::default().channels);

    assert!(!writer.write_value(ChannelName::Id, "t1"));
    assert!(!writer.fire_trigger(ChannelName::OpenTrigger));
    assert_eq!(
        ChannelDispatcher::new(writer).dispatch(&Action::open("t1")),
        Delivery::Dropped
    );
}

#[test]
fn trigger_falls_back_to_synthetic_click_for_svg_buttons() {
    let page = support::PAGE.replace(
        "<div id=\"th_open_trigger\" class=\"hidden-trigger th_open_trigger\"><button>open</button></div>",
        "<div id=\"th_open_trigger\" class=\"hidden-trigger th_open_trigger\"><svg role=\"button\"><path></path></svg></div>",
    );
    let harness = Harness::with_config(&page, BridgeConfig::default());
    let writer = HiddenChannelWriter::new(harness.query.clone(), BridgeConfig::default().channels);

    let target = writer.channel_target(ChannelName::OpenTrigger).unwrap();
    assert_eq!(target.as_element().unwrap().name.local.to_string(), "svg");
    assert!(harness.document.click(&target).is_err());

    assert!(writer.fire_trigger(ChannelName::OpenTrigger));
    assert_eq!(harness.observer.trigger_clicks(), 1);
}

#[test]
fn trigger_without_button_clicks_channel_root() {
    let page = support::PAGE.replace("<button>open</button>", "");
    let harness = Harness::with_config(&page, BridgeConfig::default());
    let writer = HiddenChannelWriter::new(harness.query.clone(), BridgeConfig::default().channels);

    let root = writer.channel_root(ChannelName::OpenTrigger).unwrap();
    assert_eq!(writer.channel_target(ChannelName::OpenTrigger), Some(root));
    assert!(writer.fire_trigger(ChannelName::OpenTrigger));
    assert_eq!(harness.observer.trigger_clicks(), 1);
    assert!(!harness.bridge.diagnostics().open_button_found);
}

#[test]
fn stale_argument_does_not_leak_into_next_action() {
    run(async {
        let harness = Harness::new();
        harness.prompter.answer("Renamed");
        harness.bridge.menu().rename("t1", "First thread");
        harness.bridge.selection().open("t2", false).dispatch.await.unwrap();
        settle().await;

        assert_eq!(
            harness.observer.actions(),
            vec![Action::rename("t1", "Renamed"), Action::open("t2")]
        );
    });
}

/// Records writes in order while passing them through to the real channels.
struct Tee {
    inner: HiddenChannelWriter,
    log: RefCell<Vec<String>>,
}

impl ChannelSink for Tee {
    fn write_value(&self, channel: ChannelName, value: &str) -> bool {
        self.log.borrow_mut().push(format!("{channel}={value}"));
        self.inner.write_value(channel, value)
    }

    fn fire_trigger(&self, channel: ChannelName) -> bool {
        self.log.borrow_mut().push(format!("{channel}!"));
        self.inner.fire_trigger(channel)
    }
}

#[test]
fn click_on_item_writes_channels_in_protocol_order() {
    run(async {
        let harness = Harness::new();
        harness.bridge.stop();

        let tee = Rc::new(Tee {
            inner: HiddenChannelWriter::new(harness.query.clone(), BridgeConfig::default().channels),
            log: RefCell::new(Vec::new()),
        });
        let bridge = thread_bridge::Bridge::new(
            Rc::clone(&harness.document),
            BridgeConfig::default(),
            Rc::new(ChannelDispatcher::new(Rc::clone(&tee))),
            harness.prompter.clone(),
        );
        assert!(bridge.start());
        support::drive(&bridge);

        let item = harness.item("t3", false);
        harness.click(harness.title_of(&item));
        // Only the kind reset happens before the deferred dispatch runs.
        assert_eq!(*tee.log.borrow(), vec!["action-kind=".to_string()]);

        settle().await;
        assert_eq!(
            *tee.log.borrow(),
            vec![
                "action-kind=",
                "action-kind=",
                "action-argument=",
                "action-id=t3",
                "action-kind=open",
                "open-trigger!",
            ]
        );
        assert_eq!(harness.observer.actions(), vec![Action::open("t3")]);
    });
}
