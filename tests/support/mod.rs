#![allow(dead_code)]

use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use keyboard_types::Key;
use kuchiki::NodeRef;
use thread_bridge::dom::{DomEvent, ElementExt, EventType, MouseButton};
use thread_bridge::query::DeepQuery;
use thread_bridge::{Bridge, BridgeConfig, ChannelObserver, Document, ScriptedPrompter};
use tokio::runtime::{Builder, Handle};
use tokio::task::LocalSet;

/// A page shaped like the hosted app: everything lives in the app root's
/// shadow tree, the side panel sits one shadow level deeper.
pub const PAGE: &str = r#"
<!DOCTYPE html>
<html>
  <body>
    <gradio-app>
      <template shadowrootmode="open">
        <div class="gradio-container">
          <div id="th_action_id" class="hidden-trigger th_action_id"><label><textarea></textarea></label></div>
          <div id="th_action_kind" class="hidden-trigger th_action_kind"><label><textarea></textarea></label></div>
          <div id="th_action_arg" class="hidden-trigger th_action_arg"><label><textarea></textarea></label></div>
          <div id="th_open_trigger" class="hidden-trigger th_open_trigger"><button>open</button></div>
          <div class="tab-nav" role="tablist">
            <button role="tab" aria-selected="false">Chat</button>
            <button role="tab" aria-selected="true">Threads</button>
          </div>
          <side-panel>
            <template shadowrootmode="open">
              <div id="threads_list">
                <div class="threads-list" data-selected="t2">
                  <div class="thread-link" data-tid="t1"><span class="thread-title">First thread</span></div>
                  <div class="thread-link selected" data-tid="t2"><span class="thread-title">Second thread</span></div>
                  <div class="thread-link" data-tid="t3"><span class="thread-title"></span></div>
                </div>
              </div>
            </template>
          </side-panel>
          <div id="threads_list_tab">
            <div class="threads-list" data-selected="t2">
              <div class="thread-link" data-tid="t1"><div class="thread-row"><div class="thread-main"><span class="thread-title">First thread</span></div></div></div>
              <div class="thread-link selected" data-tid="t2"><div class="thread-row"><div class="thread-main"><span class="thread-title">Second thread</span></div></div></div>
              <div class="thread-link" data-tid="t3"><div class="thread-row"><div class="thread-main"><span class="thread-title"></span></div></div></div>
            </div>
          </div>
        </div>
      </template>
    </gradio-app>
  </body>
</html>
"#;

pub struct Harness {
    pub document: Rc<Document>,
    pub bridge: Bridge,
    pub observer: Rc<ChannelObserver>,
    pub prompter: Rc<ScriptedPrompter>,
    pub query: DeepQuery,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PAGE, BridgeConfig::default())
    }

    pub fn with_config(html: &str, config: BridgeConfig) -> Self {
        let document = Rc::new(Document::parse(html));
        let observer = ChannelObserver::attach(Rc::clone(&document), &config);
        let prompter = Rc::new(ScriptedPrompter::new());
        let query = DeepQuery::new(Rc::clone(&document), config.app_root.clone());
        let bridge = Bridge::with_hidden_channels(Rc::clone(&document), config, prompter.clone());
        bridge.start();
        if Handle::try_current().is_ok() {
            drive(&bridge);
        }
        Self {
            document,
            bridge,
            observer,
            prompter,
            query,
        }
    }

    /// The item `target_id` in the side panel (`secondary == false`) or tab copy.
    pub fn item(&self, target_id: &str, secondary: bool) -> NodeRef {
        let lists = self.bridge.lists();
        let root = if secondary {
            lists.secondary_root()
        } else {
            lists.primary_root()
        }
        .expect("list copy rendered");
        lists
            .items(&root)
            .into_iter()
            .find(|item| lists.item_id(item) == target_id)
            .unwrap_or_else(|| panic!("missing item {target_id}"))
    }

    pub fn title_of(&self, item: &NodeRef) -> NodeRef {
        self.query
            .find_within(item, ".thread-title")
            .expect("title element")
    }

    pub fn click(&self, target: NodeRef) {
        self.document.dispatch_event(&DomEvent::mouse(
            EventType::Click,
            target,
            MouseButton::Main,
            0.0,
            0.0,
        ));
    }

    pub fn right_click(&self, target: NodeRef, x: f64, y: f64) -> bool {
        self.document
            .dispatch_event(&DomEvent::mouse(
                EventType::ContextMenu,
                target,
                MouseButton::Secondary,
                x,
                y,
            ))
            .default_prevented
    }

    pub fn press(&self, key: Key) {
        let body = self.document.body().expect("body");
        self.document.dispatch_event(&DomEvent::key(body, key));
    }

    pub fn menu_entry(&self, act: &str) -> NodeRef {
        let menu = self.bridge.menu().menu_element().expect("menu created");
        self.query
            .find_all_within(&menu, ".ctx-item")
            .into_iter()
            .find(|entry| entry.attr("data-act").as_deref() == Some(act))
            .unwrap_or_else(|| panic!("missing menu entry {act}"))
    }

    pub fn tab(&self, label: &str) -> NodeRef {
        self.query
            .find_all("[role=\"tab\"]")
            .into_iter()
            .find(|tab| tab.trimmed_text() == label)
            .unwrap_or_else(|| panic!("missing tab {label}"))
    }

    /// Makes tab buttons behave like the host's tab strip: a click selects it.
    pub fn install_tab_host(&self) {
        for tab in self.query.find_all("[role=\"tab\"]") {
            let query = self.query.clone();
            self.document.add_event_listener(
                &tab,
                EventType::Click,
                Rc::new(move |event: &DomEvent| {
                    for other in query.find_all("[role=\"tab\"]") {
                        let selected = other == event.target;
                        other.set_attr("aria-selected", if selected { "true" } else { "false" });
                    }
                }),
            );
        }
    }
}

/// Runs the bridge's deferred tasks on the current `LocalSet`.
pub fn drive(bridge: &Bridge) {
    tokio::task::spawn_local(bridge.task_driver());
}

pub fn run<F: Future>(future: F) -> F::Output {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();
    LocalSet::new().block_on(&runtime, future)
}

/// Like [`run`], without an ambient `LocalSet`.
pub fn block_on<F: Future>(future: F) -> F::Output {
    Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

/// Lets deferred dispatches and short polls finish.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
