//! Hidden proxy controls the backend renders and observes.

use std::fmt;
use std::rc::Rc;

use kuchiki::NodeRef;
use tracing::{debug, warn};

use crate::config::ChannelClasses;
use crate::dom::{DomEvent, EventType, MouseButton};
use crate::query::DeepQuery;

pub(crate) const VALUE_ELEMENTS: &str = "textarea, input";
pub(crate) const CLICKABLE_ELEMENTS: &str = "button, [role=\"button\"], .gr-button";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    Id,
    Kind,
    Argument,
    OpenTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Value,
    Trigger,
}

impl ChannelName {
    pub const ALL: [ChannelName; 4] = [
        ChannelName::Id,
        ChannelName::Kind,
        ChannelName::Argument,
        ChannelName::OpenTrigger,
    ];

    pub fn kind(self) -> ChannelKind {
        match self {
            ChannelName::OpenTrigger => ChannelKind::Trigger,
            _ => ChannelKind::Value,
        }
    }

    pub fn class_name(self, classes: &ChannelClasses) -> &str {
        match self {
            ChannelName::Id => &classes.id,
            ChannelName::Kind => &classes.kind,
            ChannelName::Argument => &classes.argument,
            ChannelName::OpenTrigger => &classes.open_trigger,
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelName::Id => "action-id",
            ChannelName::Kind => "action-kind",
            ChannelName::Argument => "action-argument",
            ChannelName::OpenTrigger => "open-trigger",
        })
    }
}

/// Low-level writes into named channels. Both calls report whether the
/// channel was found; delivery beyond that is not observable.
pub trait ChannelSink {
    fn write_value(&self, channel: ChannelName, value: &str) -> bool;
    fn fire_trigger(&self, channel: ChannelName) -> bool;
}

impl<S: ChannelSink + ?Sized> ChannelSink for Rc<S> {
    fn write_value(&self, channel: ChannelName, value: &str) -> bool {
        (**self).write_value(channel, value)
    }

    fn fire_trigger(&self, channel: ChannelName) -> bool {
        (**self).fire_trigger(channel)
    }
}

/// Drives channels rendered into a document.
pub struct HiddenChannelWriter {
    query: DeepQuery,
    classes: ChannelClasses,
}

impl HiddenChannelWriter {
    pub fn new(query: DeepQuery, classes: ChannelClasses) -> Self {
        Self { query, classes }
    }

    pub fn channel_root(&self, channel: ChannelName) -> Option<NodeRef> {
        self.query
            .find_first(&format!(".{}", channel.class_name(&self.classes)))
    }

    /// The element that carries the value, or is clicked, for `channel`.
    pub fn channel_target(&self, channel: ChannelName) -> Option<NodeRef> {
        let root = self.channel_root(channel)?;
        match channel.kind() {
            ChannelKind::Value => self.query.find_within(&root, VALUE_ELEMENTS),
            ChannelKind::Trigger => self
                .query
                .find_within(&root, CLICKABLE_ELEMENTS)
                .or(Some(root)),
        }
    }

    pub fn read_value(&self, channel: ChannelName) -> Option<String> {
        let input = self.channel_target(channel)?;
        Some(self.query.document().value(&input))
    }
}

impl ChannelSink for HiddenChannelWriter {
    fn write_value(&self, channel: ChannelName, value: &str) -> bool {
        let Some(root) = self.channel_root(channel) else {
            debug!(target = "thread_bridge::channel", %channel, "channel not rendered");
            return false;
        };
        let Some(input) = self.query.find_within(&root, VALUE_ELEMENTS) else {
            debug!(target = "thread_bridge::channel", %channel, "channel has no value element");
            return false;
        };

        let document = self.query.document();
        document.set_value(&input, value);
        document.dispatch_event(&DomEvent::bubbling(EventType::Input, input.clone()));
        document.dispatch_event(&DomEvent::bubbling(EventType::Change, input));
        true
    }

    fn fire_trigger(&self, channel: ChannelName) -> bool {
        let Some(target) = self.channel_target(channel) else {
            debug!(target = "thread_bridge::channel", %channel, "trigger not rendered");
            return false;
        };

        let document = self.query.document();
        if let Err(err) = document.click(&target) {
            warn!(
                target = "thread_bridge::channel",
                %channel,
                error = %err,
                "native click failed, dispatching synthetic click"
            );
            document.dispatch_event(&DomEvent::mouse(
                EventType::Click,
                target,
                MouseButton::Main,
                0.0,
                0.0,
            ));
        }
        true
    }
}
