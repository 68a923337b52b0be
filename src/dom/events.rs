use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use keyboard_types::{Key, Modifiers};
use kuchiki::NodeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Input,
    Change,
    Click,
    ContextMenu,
    KeyDown,
}

impl EventType {
    pub fn name(self) -> &'static str {
        match self {
            EventType::Input => "input",
            EventType::Change => "change",
            EventType::Click => "click",
            EventType::ContextMenu => "contextmenu",
            EventType::KeyDown => "keydown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Main,
    Auxiliary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    Basic,
    Mouse {
        button: MouseButton,
        page_x: f64,
        page_y: f64,
    },
    Key {
        key: Key,
        mods: Modifiers,
    },
}

/// A DOM event travelling along the composed path of its target.
///
/// The path is filled in by [`Document::dispatch_event`](super::Document::dispatch_event);
/// listeners only ever see an event whose path is populated.
pub struct DomEvent {
    pub event_type: EventType,
    pub data: EventData,
    pub target: NodeRef,
    pub bubbles: bool,
    path: RefCell<Vec<NodeRef>>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl DomEvent {
    pub fn new(event_type: EventType, target: NodeRef, data: EventData, bubbles: bool) -> Self {
        Self {
            event_type,
            data,
            target,
            bubbles,
            path: RefCell::new(Vec::new()),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    /// `new Event(type, { bubbles: true })`
    pub fn bubbling(event_type: EventType, target: NodeRef) -> Self {
        Self::new(event_type, target, EventData::Basic, true)
    }

    pub fn mouse(
        event_type: EventType,
        target: NodeRef,
        button: MouseButton,
        page_x: f64,
        page_y: f64,
    ) -> Self {
        Self::new(
            event_type,
            target,
            EventData::Mouse {
                button,
                page_x,
                page_y,
            },
            true,
        )
    }

    pub fn key(target: NodeRef, key: Key) -> Self {
        Self::new(
            EventType::KeyDown,
            target,
            EventData::Key {
                key,
                mods: Modifiers::empty(),
            },
            true,
        )
    }

    pub fn composed_path(&self) -> Vec<NodeRef> {
        self.path.borrow().clone()
    }

    pub(crate) fn set_path(&self, path: Vec<NodeRef>) {
        *self.path.borrow_mut() = path;
    }

    pub fn path_contains(&self, node: &NodeRef) -> bool {
        self.path.borrow().iter().any(|candidate| candidate == node)
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    /// Synthesized clicks (`element.click()`) carry no mouse data and count as primary.
    pub fn is_primary_click(&self) -> bool {
        match &self.data {
            EventData::Mouse { button, .. } => *button == MouseButton::Main,
            _ => self.event_type == EventType::Click,
        }
    }

    pub fn page_position(&self) -> (f64, f64) {
        match &self.data {
            EventData::Mouse { page_x, page_y, .. } => (*page_x, *page_y),
            _ => (0.0, 0.0),
        }
    }

    pub fn pressed_key(&self) -> Option<&Key> {
        match &self.data {
            EventData::Key { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl fmt::Debug for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomEvent")
            .field("event_type", &self.event_type)
            .field("data", &self.data)
            .field("bubbles", &self.bubbles)
            .field("default_prevented", &self.default_prevented.get())
            .finish()
    }
}

pub type Listener = Rc<dyn Fn(&DomEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    pub listeners_invoked: usize,
}
