use std::cell::RefCell;
use std::future::{self, Future};
use std::rc::{Rc, Weak};

use keyboard_types::Key;
use serde::Serialize;
use tokio::task::LocalSet;
use tracing::{info, warn};

use crate::channel::{ChannelName, HiddenChannelWriter, CLICKABLE_ELEMENTS};
use crate::config::BridgeConfig;
use crate::dispatch::{ActionSink, ChannelDispatcher};
use crate::dom::{Document, DomEvent, EventType, ListenerId};
use crate::lists::ListCopies;
use crate::menu::{ContextMenuController, Position};
use crate::prompt::Prompter;
use crate::query::DeepQuery;
use crate::selection::{SelectionController, TabSwitcher};

/// What `start` could find of the markup the bridge depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub list_found: bool,
    pub input_found: bool,
    pub open_button_found: bool,
}

/// Wires the controllers to document events.
///
/// Listeners are attached by [`start`](Self::start) and removed by
/// [`stop`](Self::stop) or on drop. Both are idempotent, and at most one
/// bridge is started per document.
///
/// Deferred work (open dispatch, tab switching) is queued on the bridge's own
/// [`LocalSet`], so events can be dispatched from plain synchronous code. The
/// host runs [`task_driver`](Self::task_driver) to make that work progress.
pub struct Bridge {
    document: Rc<Document>,
    config: BridgeConfig,
    query: DeepQuery,
    lists: ListCopies,
    menu: Rc<ContextMenuController>,
    selection: Rc<SelectionController>,
    rename_key: Option<Key>,
    listeners: RefCell<Vec<ListenerId>>,
    tasks: Rc<LocalSet>,
}

impl Bridge {
    pub fn new(
        document: Rc<Document>,
        config: BridgeConfig,
        sink: Rc<dyn ActionSink>,
        prompter: Rc<dyn Prompter>,
    ) -> Self {
        let query = DeepQuery::new(Rc::clone(&document), config.app_root.clone());
        let lists = ListCopies::new(query.clone(), config.lists.clone());
        let tasks = Rc::new(LocalSet::new());
        let tabs = Rc::new(TabSwitcher::new(query.clone(), config.navigation.clone()));
        let selection = Rc::new(SelectionController::new(
            lists.clone(),
            Rc::clone(&sink),
            tabs,
            Rc::clone(&tasks),
        ));
        let menu = Rc::new(ContextMenuController::new(
            Rc::clone(&document),
            query.clone(),
            lists.clone(),
            sink,
            prompter,
            config.menu.clone(),
        ));

        let rename_key = match config.menu.rename_key.parse::<Key>() {
            Ok(key) => Some(key),
            Err(_) => {
                warn!(
                    target = "thread_bridge::bridge",
                    key = %config.menu.rename_key,
                    "unrecognized rename key, shortcut disabled"
                );
                None
            }
        };

        Self {
            document,
            config,
            query,
            lists,
            menu,
            selection,
            rename_key,
            listeners: RefCell::new(Vec::new()),
            tasks,
        }
    }

    /// A bridge that speaks the hidden-channel protocol.
    pub fn with_hidden_channels(
        document: Rc<Document>,
        config: BridgeConfig,
        prompter: Rc<dyn Prompter>,
    ) -> Self {
        let query = DeepQuery::new(Rc::clone(&document), config.app_root.clone());
        let writer = HiddenChannelWriter::new(query, config.channels.clone());
        let sink: Rc<dyn ActionSink> = Rc::new(ChannelDispatcher::new(writer));
        Self::new(document, config, sink, prompter)
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    pub fn menu(&self) -> &Rc<ContextMenuController> {
        &self.menu
    }

    pub fn selection(&self) -> &Rc<SelectionController> {
        &self.selection
    }

    pub fn lists(&self) -> &ListCopies {
        &self.lists
    }

    pub fn is_started(&self) -> bool {
        !self.listeners.borrow().is_empty()
    }

    /// The set holding this bridge's deferred tasks.
    pub fn tasks(&self) -> &Rc<LocalSet> {
        &self.tasks
    }

    /// Runs deferred tasks forever. Spawn it on the host's `LocalSet`.
    pub fn task_driver(&self) -> impl Future<Output = ()> + 'static {
        let tasks = Rc::clone(&self.tasks);
        async move { tasks.run_until(future::pending::<()>()).await }
    }

    /// Attaches the document listeners. Returns `false` if this bridge, or
    /// another one on the same document, is already started.
    pub fn start(&self) -> bool {
        if self.is_started() {
            return false;
        }
        if !self.document.claim_bridge() {
            warn!(
                target = "thread_bridge::bridge",
                "document already has a started bridge, not attaching"
            );
            return false;
        }

        let root = self.document.root();
        let mut listeners = Vec::with_capacity(4);

        let menu = Rc::downgrade(&self.menu);
        listeners.push(self.document.add_event_listener(
            &root,
            EventType::Click,
            Rc::new(move |event: &DomEvent| {
                if let Some(menu) = Weak::upgrade(&menu) {
                    menu.handle_outside_click(event);
                }
            }),
        ));

        let menu = Rc::downgrade(&self.menu);
        let rename_key = self.rename_key.clone();
        listeners.push(self.document.add_event_listener(
            &root,
            EventType::KeyDown,
            Rc::new(move |event: &DomEvent| {
                let (Some(menu), Some(key)) = (Weak::upgrade(&menu), event.pressed_key()) else {
                    return;
                };
                if *key == Key::Escape {
                    menu.hide();
                } else if rename_key.as_ref() == Some(key) {
                    menu.rename_selected();
                }
            }),
        ));

        let selection = Rc::downgrade(&self.selection);
        listeners.push(self.document.add_event_listener(
            &root,
            EventType::Click,
            Rc::new(move |event: &DomEvent| {
                if let Some(selection) = Weak::upgrade(&selection) {
                    selection.handle_click(event);
                }
            }),
        ));

        let menu = Rc::downgrade(&self.menu);
        let lists = self.lists.clone();
        listeners.push(self.document.add_event_listener(
            &root,
            EventType::ContextMenu,
            Rc::new(move |event: &DomEvent| {
                let Some(menu) = Weak::upgrade(&menu) else {
                    return;
                };
                let Some(item) = lists.item_for_event(event) else {
                    return;
                };
                event.prevent_default();
                let (x, y) = event.page_position();
                menu.show_for(&item, Position { x, y });
            }),
        ));

        *self.listeners.borrow_mut() = listeners;

        let diagnostics = self.diagnostics();
        info!(
            target = "thread_bridge::bridge",
            list_found = diagnostics.list_found,
            input_found = diagnostics.input_found,
            open_button_found = diagnostics.open_button_found,
            "bridge started"
        );
        true
    }

    /// Detaches the document listeners. Returns `false` if not started.
    pub fn stop(&self) -> bool {
        let listeners: Vec<ListenerId> = self.listeners.borrow_mut().drain(..).collect();
        if listeners.is_empty() {
            return false;
        }
        for id in listeners {
            self.document.remove_event_listener(id);
        }
        self.document.release_bridge();
        self.menu.hide();
        info!(target = "thread_bridge::bridge", "bridge stopped");
        true
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let channels = HiddenChannelWriter::new(self.query.clone(), self.config.channels.clone());
        Diagnostics {
            list_found: self.lists.primary_root().is_some(),
            input_found: channels.channel_target(ChannelName::Id).is_some(),
            open_button_found: channels
                .channel_root(ChannelName::OpenTrigger)
                .and_then(|root| self.query.find_within(&root, CLICKABLE_ELEMENTS))
                .is_some(),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}
