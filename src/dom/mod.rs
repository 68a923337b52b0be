//! In-memory document with shadow roots and composed event dispatch.
//!
//! Element trees come from kuchiki. Shadow roots are tracked on the side:
//! a `<template shadowrootmode>` is detached from its parent and its contents
//! become the parent's shadow root, the same way a browser upgrades
//! declarative shadow DOM.

pub mod events;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use kuchiki::traits::*;
use kuchiki::{NodeRef, Selectors};
use tracing::trace;

use crate::error::DomError;

pub use events::{
    DispatchOutcome, DomEvent, EventData, EventType, Listener, ListenerId, MouseButton,
};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Pointer identity of a node, stable while the node is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn of(node: &NodeRef) -> Self {
        Self(Rc::as_ptr(&node.0) as usize)
    }
}

#[derive(Default)]
struct ShadowIndex {
    by_host: HashMap<NodeKey, NodeRef>,
    host_of_root: HashMap<NodeKey, NodeRef>,
}

struct ListenerEntry {
    id: ListenerId,
    node: NodeRef,
    event_type: EventType,
    callback: Listener,
}

pub struct Document {
    root: NodeRef,
    shadows: RefCell<ShadowIndex>,
    listeners: RefCell<Vec<ListenerEntry>>,
    next_listener_id: Cell<u64>,
    bridge_attached: Cell<bool>,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        let document = Self {
            root: kuchiki::parse_html().one(html),
            shadows: RefCell::new(ShadowIndex::default()),
            listeners: RefCell::new(Vec::new()),
            next_listener_id: Cell::new(1),
            bridge_attached: Cell::new(false),
        };
        let root = document.root.clone();
        document.upgrade_declarative_shadow_roots(&root);
        document
    }

    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    pub fn body(&self) -> Option<NodeRef> {
        self.root
            .select_first("body")
            .ok()
            .map(|body| body.as_node().clone())
    }

    /// Parses `html` into detached nodes owned by this document.
    pub fn fragment(&self, html: &str) -> Vec<NodeRef> {
        let parsed = kuchiki::parse_html().one(html);
        let Ok(body) = parsed.select_first("body") else {
            return Vec::new();
        };
        let nodes: Vec<NodeRef> = body.as_node().children().collect();
        for node in &nodes {
            node.detach();
            self.upgrade_declarative_shadow_roots(node);
        }
        nodes
    }

    /// Replaces the children of `node`, like assigning `innerHTML`.
    pub fn set_inner_html(&self, node: &NodeRef, html: &str) {
        let existing: Vec<NodeRef> = node.children().collect();
        for child in existing {
            child.detach();
        }
        for child in self.fragment(html) {
            node.append(child);
        }
    }

    pub fn attach_shadow(&self, host: &NodeRef) -> NodeRef {
        if let Some(existing) = self.shadow_root(host) {
            return existing;
        }
        let shadow_root = NodeRef::new_document();
        self.register_shadow(host, shadow_root.clone());
        shadow_root
    }

    pub fn shadow_root(&self, host: &NodeRef) -> Option<NodeRef> {
        self.shadows.borrow().by_host.get(&NodeKey::of(host)).cloned()
    }

    pub fn host_of(&self, shadow_root: &NodeRef) -> Option<NodeRef> {
        self.shadows
            .borrow()
            .host_of_root
            .get(&NodeKey::of(shadow_root))
            .cloned()
    }

    fn register_shadow(&self, host: &NodeRef, shadow_root: NodeRef) {
        let mut shadows = self.shadows.borrow_mut();
        shadows
            .host_of_root
            .insert(NodeKey::of(&shadow_root), host.clone());
        shadows.by_host.insert(NodeKey::of(host), shadow_root);
    }

    fn upgrade_declarative_shadow_roots(&self, scope: &NodeRef) {
        let templates: Vec<NodeRef> = scope
            .descendants()
            .filter(is_declarative_shadow_template)
            .collect();

        for template in templates {
            let Some(host) = template.parent() else {
                continue;
            };
            let contents = template
                .as_element()
                .and_then(|element| element.template_contents.clone());
            template.detach();

            let Some(contents) = contents else {
                continue;
            };
            // First declaration wins; later templates on the same host are dropped.
            if self.shadow_root(&host).is_some() {
                continue;
            }
            self.register_shadow(&host, contents.clone());
            self.upgrade_declarative_shadow_roots(&contents);
        }
    }

    /// Target first, then ancestors, stepping from each shadow root to its host.
    pub fn composed_path(&self, target: &NodeRef) -> Vec<NodeRef> {
        let mut path = Vec::new();
        let mut current = Some(target.clone());
        while let Some(node) = current {
            current = node.parent().or_else(|| self.host_of(&node));
            path.push(node);
        }
        path
    }

    pub fn is_connected(&self, node: &NodeRef) -> bool {
        self.composed_path(node)
            .last()
            .map_or(false, |top| *top == self.root)
    }

    pub fn add_event_listener(
        &self,
        node: &NodeRef,
        event_type: EventType,
        callback: Listener,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id.get());
        self.next_listener_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(ListenerEntry {
            id,
            node: node.clone(),
            event_type,
            callback,
        });
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|entry| entry.id != id);
        listeners.len() != before
    }

    /// Claims the document for one bridge. `false` while another holds it.
    pub fn claim_bridge(&self) -> bool {
        !self.bridge_attached.replace(true)
    }

    pub fn release_bridge(&self) {
        self.bridge_attached.set(false);
    }

    pub fn has_bridge(&self) -> bool {
        self.bridge_attached.get()
    }

    pub fn listener_count(&self, event_type: EventType) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|entry| entry.event_type == event_type)
            .count()
    }

    pub fn dispatch_event(&self, event: &DomEvent) -> DispatchOutcome {
        let path = self.composed_path(&event.target);
        event.set_path(path.clone());

        let stops = if event.bubbles { path.len() } else { 1 };
        let mut invoked = 0usize;

        for node in path.iter().take(stops) {
            // Listeners may add or remove listeners; snapshot before calling out.
            let callbacks: Vec<Listener> = self
                .listeners
                .borrow()
                .iter()
                .filter(|entry| entry.event_type == event.event_type && entry.node == *node)
                .map(|entry| Rc::clone(&entry.callback))
                .collect();

            for callback in callbacks {
                callback(event);
                invoked += 1;
            }

            if event.propagation_stopped() {
                break;
            }
        }

        trace!(
            target = "thread_bridge::dom",
            event = %event.event_type,
            listeners = invoked,
            "dispatched event"
        );

        DispatchOutcome {
            default_prevented: event.default_prevented(),
            propagation_stopped: event.propagation_stopped(),
            listeners_invoked: invoked,
        }
    }

    /// `HTMLElement.click()`. Elements outside the HTML namespace have no
    /// `click()` and report an error instead.
    pub fn click(&self, node: &NodeRef) -> Result<DispatchOutcome, DomError> {
        let element = node.as_element().ok_or(DomError::NotAnElement)?;
        if &*element.name.ns != HTML_NAMESPACE {
            return Err(DomError::UnsupportedClick {
                tag: element.name.local.to_string(),
            });
        }
        if node.attr("disabled").is_some() {
            return Ok(DispatchOutcome::default());
        }
        Ok(self.dispatch_event(&DomEvent::bubbling(EventType::Click, node.clone())))
    }

    pub fn value(&self, node: &NodeRef) -> String {
        if node.local_name().as_deref() == Some("textarea") {
            node.text_contents()
        } else {
            node.attr("value").unwrap_or_default()
        }
    }

    pub fn set_value(&self, node: &NodeRef, value: &str) {
        if node.local_name().as_deref() == Some("textarea") {
            let existing: Vec<NodeRef> = node.children().collect();
            for child in existing {
                child.detach();
            }
            if !value.is_empty() {
                node.append(NodeRef::new_text(value));
            }
        } else {
            node.set_attr("value", value);
        }
    }
}

fn is_declarative_shadow_template(node: &NodeRef) -> bool {
    node.as_element().map_or(false, |element| {
        &*element.name.local == "template"
            && element.attributes.borrow().contains("shadowrootmode")
    })
}

/// Attribute, class and style helpers on element nodes. Non-elements read as
/// empty and ignore writes.
pub trait ElementExt {
    fn attr(&self, name: &str) -> Option<String>;
    fn set_attr(&self, name: &str, value: &str);
    fn remove_attr(&self, name: &str);
    fn local_name(&self) -> Option<String>;
    fn html_id(&self) -> Option<String>;
    fn has_class(&self, class: &str) -> bool;
    fn set_class(&self, class: &str, present: bool);
    fn matches(&self, selectors: &Selectors) -> bool;
    fn style_property(&self, property: &str) -> Option<String>;
    fn set_style_property(&self, property: &str, value: &str);
    fn trimmed_text(&self) -> String;
}

impl ElementExt for NodeRef {
    fn attr(&self, name: &str) -> Option<String> {
        let element = self.as_element()?;
        let attributes = element.attributes.borrow();
        attributes.get(name).map(str::to_string)
    }

    fn set_attr(&self, name: &str, value: &str) {
        if let Some(element) = self.as_element() {
            element
                .attributes
                .borrow_mut()
                .insert(name, value.to_string());
        }
    }

    fn remove_attr(&self, name: &str) {
        if let Some(element) = self.as_element() {
            element.attributes.borrow_mut().remove(name);
        }
    }

    fn local_name(&self) -> Option<String> {
        self.as_element()
            .map(|element| element.name.local.to_string())
    }

    fn html_id(&self) -> Option<String> {
        self.attr("id")
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map_or(false, |classes| classes.split_whitespace().any(|c| c == class))
    }

    fn set_class(&self, class: &str, present: bool) {
        if self.as_element().is_none() || self.has_class(class) == present {
            return;
        }
        let current = self.attr("class").unwrap_or_default();
        let mut classes: Vec<&str> = current
            .split_whitespace()
            .filter(|existing| *existing != class)
            .collect();
        if present {
            classes.push(class);
        }
        self.set_attr("class", &classes.join(" "));
    }

    fn matches(&self, selectors: &Selectors) -> bool {
        self.clone()
            .into_element_ref()
            .map_or(false, |element| selectors.matches(&element))
    }

    fn style_property(&self, property: &str) -> Option<String> {
        let style = self.attr("style")?;
        parse_style(&style)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    fn set_style_property(&self, property: &str, value: &str) {
        let mut declarations = self
            .attr("style")
            .map(|style| parse_style(&style))
            .unwrap_or_default();
        match declarations.iter_mut().find(|(name, _)| name == property) {
            Some(existing) => existing.1 = value.to_string(),
            None => declarations.push((property.to_string(), value.to_string())),
        }
        let serialized = declarations
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr("style", &serialized);
    }

    fn trimmed_text(&self) -> String {
        self.text_contents().trim().to_string()
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
