//! Backend-side view of the hidden channels.
//!
//! Mirrors how a server-driven UI observes its controls: a change only counts
//! when the value differs from the last one seen, and a transition of the kind
//! channel to a non-empty value means an action is ready.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::channel::{ChannelKind, ChannelName, HiddenChannelWriter};
use crate::config::BridgeConfig;
use crate::dispatch::{Action, ActionKind};
use crate::dom::{Document, DomEvent, EventType, ListenerId};
use crate::query::DeepQuery;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub channel: ChannelName,
    pub from: String,
    pub to: String,
}

pub struct ChannelObserver {
    document: Rc<Document>,
    channels: HiddenChannelWriter,
    last_seen: RefCell<HashMap<ChannelName, String>>,
    transitions: RefCell<Vec<Transition>>,
    actions: RefCell<Vec<Action>>,
    trigger_clicks: Cell<usize>,
    listeners: RefCell<Vec<ListenerId>>,
}

impl ChannelObserver {
    /// Starts observing every channel currently rendered in `document`.
    pub fn attach(document: Rc<Document>, config: &BridgeConfig) -> Rc<Self> {
        let query = DeepQuery::new(Rc::clone(&document), config.app_root.clone());
        let channels = HiddenChannelWriter::new(query, config.channels.clone());
        let observer = Rc::new(Self {
            document,
            channels,
            last_seen: RefCell::new(HashMap::new()),
            transitions: RefCell::new(Vec::new()),
            actions: RefCell::new(Vec::new()),
            trigger_clicks: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        });

        for channel in ChannelName::ALL {
            let Some(root) = observer.channels.channel_root(channel) else {
                warn!(target = "thread_bridge::backend", %channel, "channel not rendered");
                continue;
            };

            let weak = Rc::downgrade(&observer);
            let listener = match channel.kind() {
                ChannelKind::Value => {
                    let initial = observer.channels.read_value(channel).unwrap_or_default();
                    observer.last_seen.borrow_mut().insert(channel, initial);
                    observer.document.add_event_listener(
                        &root,
                        EventType::Change,
                        Rc::new(move |event: &DomEvent| {
                            if let Some(observer) = Weak::upgrade(&weak) {
                                let value = observer.document.value(&event.target);
                                observer.observe_change(channel, value);
                            }
                        }),
                    )
                }
                ChannelKind::Trigger => observer.document.add_event_listener(
                    &root,
                    EventType::Click,
                    Rc::new(move |_: &DomEvent| {
                        if let Some(observer) = Weak::upgrade(&weak) {
                            observer.trigger_clicks.set(observer.trigger_clicks.get() + 1);
                        }
                    }),
                ),
            };
            observer.listeners.borrow_mut().push(listener);
        }

        observer
    }

    fn observe_change(&self, channel: ChannelName, value: String) {
        let previous = self
            .last_seen
            .borrow_mut()
            .insert(channel, value.clone())
            .unwrap_or_default();
        if previous == value {
            return;
        }
        self.transitions.borrow_mut().push(Transition {
            channel,
            from: previous,
            to: value.clone(),
        });

        if channel != ChannelName::Kind || value.is_empty() {
            return;
        }
        match value.parse::<ActionKind>() {
            Ok(kind) => {
                let action = Action::new(
                    kind,
                    self.channels.read_value(ChannelName::Id).unwrap_or_default(),
                    self.channels
                        .read_value(ChannelName::Argument)
                        .unwrap_or_default(),
                );
                debug!(target = "thread_bridge::backend", ?action, "action ready");
                self.actions.borrow_mut().push(action);
            }
            Err(err) => warn!(target = "thread_bridge::backend", error = %err, "unknown kind"),
        }
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.transitions.borrow().clone()
    }

    /// Transitions of the kind channel to a non-empty value.
    pub fn ready_count(&self) -> usize {
        self.transitions
            .borrow()
            .iter()
            .filter(|t| t.channel == ChannelName::Kind && !t.to.is_empty())
            .count()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.borrow().clone()
    }

    /// Drains the actions observed since the last call.
    pub fn take_actions(&self) -> Vec<Action> {
        std::mem::take(&mut *self.actions.borrow_mut())
    }

    pub fn trigger_clicks(&self) -> usize {
        self.trigger_clicks.get()
    }

    pub fn detach(&self) {
        for id in self.listeners.borrow_mut().drain(..) {
            self.document.remove_event_listener(id);
        }
    }
}
