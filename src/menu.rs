//! Right-click menu offering rename, share and delete for one list item.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use html_escape::encode_text;
use kuchiki::NodeRef;
use tracing::{debug, info};

use crate::config::MenuConfig;
use crate::dispatch::{Action, ActionKind, ActionSink, Delivery};
use crate::dom::{Document, DomEvent, ElementExt, EventType, ListenerId};
use crate::lists::ListCopies;
use crate::prompt::Prompter;
use crate::query::{compile, DeepQuery};

pub const MENU_CLASS: &str = "ctx-menu";
pub const MENU_ITEM_CLASS: &str = "ctx-item";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextMenuState {
    pub visible: bool,
    pub target_id: String,
    pub target_title: String,
    pub position: Position,
}

pub struct ContextMenuController {
    document: Rc<Document>,
    query: DeepQuery,
    lists: ListCopies,
    sink: Rc<dyn ActionSink>,
    prompter: Rc<dyn Prompter>,
    config: MenuConfig,
    state: RefCell<ContextMenuState>,
    menu: RefCell<Option<NodeRef>>,
    menu_listener: Cell<Option<ListenerId>>,
    created: Cell<usize>,
}

impl ContextMenuController {
    pub fn new(
        document: Rc<Document>,
        query: DeepQuery,
        lists: ListCopies,
        sink: Rc<dyn ActionSink>,
        prompter: Rc<dyn Prompter>,
        config: MenuConfig,
    ) -> Self {
        Self {
            document,
            query,
            lists,
            sink,
            prompter,
            config,
            state: RefCell::new(ContextMenuState::default()),
            menu: RefCell::new(None),
            menu_listener: Cell::new(None),
            created: Cell::new(0),
        }
    }

    pub fn state(&self) -> ContextMenuState {
        self.state.borrow().clone()
    }

    pub fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }

    /// How many menu elements this controller has built.
    pub fn creation_count(&self) -> usize {
        self.created.get()
    }

    pub fn menu_element(&self) -> Option<NodeRef> {
        self.menu.borrow().clone()
    }

    /// Returns the menu element. A menu already in the document is reused,
    /// whichever controller built it; otherwise one is built.
    pub fn ensure_menu(self: &Rc<Self>) -> NodeRef {
        if let Some(menu) = self.menu_element() {
            if self.document.is_connected(&menu) {
                return menu;
            }
        }
        self.release_menu_listener();

        let menu = match self.query.find_first(&format!(".{MENU_CLASS}")) {
            Some(existing) => {
                debug!(target = "thread_bridge::menu", "reusing context menu from document");
                existing
            }
            None => self.build_menu(),
        };

        let controller = Rc::downgrade(self);
        let listener = self.document.add_event_listener(
            &menu,
            EventType::Click,
            Rc::new(move |event: &DomEvent| {
                if let Some(controller) = Weak::upgrade(&controller) {
                    controller.handle_menu_click(event);
                }
            }),
        );
        self.menu_listener.set(Some(listener));
        *self.menu.borrow_mut() = Some(menu.clone());
        menu
    }

    fn build_menu(&self) -> NodeRef {
        let entries = [
            (ActionKind::Rename, &self.config.rename_label),
            (ActionKind::Share, &self.config.share_label),
            (ActionKind::Delete, &self.config.delete_label),
        ]
        .iter()
        .map(|(kind, label)| {
            format!(
                "<div class=\"{MENU_ITEM_CLASS}\" data-act=\"{}\">{}</div>",
                kind.as_str(),
                encode_text(label.as_str())
            )
        })
        .collect::<String>();
        let html = format!("<div class=\"{MENU_CLASS}\" style=\"display: none;\">{entries}</div>");

        let menu = self
            .document
            .fragment(&html)
            .into_iter()
            .find(|node| node.has_class(MENU_CLASS))
            .unwrap_or_else(NodeRef::new_document);
        let parent = self.document.body().unwrap_or_else(|| self.document.root());
        parent.append(menu.clone());

        self.created.set(self.created.get() + 1);
        info!(target = "thread_bridge::menu", "context menu created");
        menu
    }

    fn release_menu_listener(&self) {
        if let Some(id) = self.menu_listener.take() {
            self.document.remove_event_listener(id);
        }
    }

    /// Right-click on `item`.
    pub fn show_for(self: &Rc<Self>, item: &NodeRef, position: Position) {
        let menu = self.ensure_menu();
        let target_id = self.lists.item_id(item);
        let target_title = self.lists.item_title(item);

        menu.set_style_property("left", &format!("{}px", position.x));
        menu.set_style_property("top", &format!("{}px", position.y));
        menu.set_attr("data-tid", &target_id);
        menu.set_attr("data-title", &target_title);
        menu.set_style_property("display", "block");

        debug!(target = "thread_bridge::menu", %target_id, "context menu shown");
        *self.state.borrow_mut() = ContextMenuState {
            visible: true,
            target_id,
            target_title,
            position,
        };
    }

    pub fn hide(&self) {
        if let Some(menu) = self.menu_element() {
            menu.set_style_property("display", "none");
        }
        self.state.borrow_mut().visible = false;
    }

    /// Hides the menu when a click lands outside it.
    pub fn handle_outside_click(&self, event: &DomEvent) {
        if !self.is_visible() {
            return;
        }
        let inside = self
            .menu_element()
            .map_or(false, |menu| event.path_contains(&menu));
        if !inside {
            self.hide();
        }
    }

    fn handle_menu_click(&self, event: &DomEvent) {
        // A shared menu element may carry listeners from other controllers.
        if !self.is_visible() {
            return;
        }
        let chosen = compile(&format!(".{MENU_ITEM_CLASS}")).and_then(|selectors| {
            event
                .composed_path()
                .into_iter()
                .find(|node| node.matches(&selectors))
                .and_then(|entry| entry.attr("data-act"))
        });

        match chosen.as_deref().map(str::parse::<ActionKind>) {
            Some(Ok(kind)) => {
                self.choose(kind);
            }
            Some(Err(err)) => {
                debug!(target = "thread_bridge::menu", error = %err, "ignoring menu entry");
                self.hide();
            }
            None => self.hide(),
        }
    }

    /// Runs the chosen entry against the current target and hides the menu.
    /// `None` when nothing was dispatched.
    pub fn choose(&self, kind: ActionKind) -> Option<Delivery> {
        let ContextMenuState {
            target_id,
            target_title,
            ..
        } = self.state();

        let delivery = match kind {
            ActionKind::Rename => self.rename(&target_id, &target_title),
            ActionKind::Share => Some(self.sink.dispatch(&Action::share(target_id))),
            ActionKind::Delete => self.delete(&target_id, &target_title),
            ActionKind::Open => {
                debug!(target = "thread_bridge::menu", "open is not a menu action");
                None
            }
        };
        self.hide();
        delivery
    }

    /// Prompts for a new title. Blank input aborts.
    pub fn rename(&self, target_id: &str, current_title: &str) -> Option<Delivery> {
        let answer = self
            .prompter
            .prompt(&self.config.rename_prompt, current_title)?;
        let title = answer.trim();
        if title.is_empty() {
            debug!(target = "thread_bridge::menu", %target_id, "rename aborted");
            return None;
        }

        let delivery = self.sink.dispatch(&Action::rename(target_id, title));
        self.lists.update_title(target_id, title);
        Some(delivery)
    }

    /// Rename shortcut for the currently selected item.
    pub fn rename_selected(&self) -> Option<Delivery> {
        let item = self.lists.selected_item()?;
        let target_id = self.lists.item_id(&item);
        let title = self.lists.item_title(&item);
        self.rename(&target_id, &title)
    }

    pub fn delete(&self, target_id: &str, title: &str) -> Option<Delivery> {
        let shown = if title.is_empty() {
            self.config.untitled.as_str()
        } else {
            title
        };
        let message = self.config.delete_confirm.replace("{title}", shown);
        if !self.prompter.confirm(&message) {
            debug!(target = "thread_bridge::menu", %target_id, "delete declined");
            return None;
        }

        let delivery = self.sink.dispatch(&Action::delete(target_id));
        let removed = self.lists.remove_item(target_id);
        debug!(target = "thread_bridge::menu", %target_id, removed, "removed item copies");
        Some(delivery)
    }
}

impl Drop for ContextMenuController {
    fn drop(&mut self) {
        self.release_menu_listener();
    }
}
