//! Every rendered copy of the item list (side panel and tab view).

use kuchiki::NodeRef;

use crate::config::ListMarkup;
use crate::dom::{DomEvent, ElementExt};
use crate::query::{compile, DeepQuery};

#[derive(Clone)]
pub struct ListCopies {
    query: DeepQuery,
    markup: ListMarkup,
}

impl ListCopies {
    pub fn new(query: DeepQuery, markup: ListMarkup) -> Self {
        Self { query, markup }
    }

    pub fn markup(&self) -> &ListMarkup {
        &self.markup
    }

    pub fn primary_root(&self) -> Option<NodeRef> {
        self.query.find_by_id(&self.markup.primary_list_id)
    }

    pub fn secondary_root(&self) -> Option<NodeRef> {
        self.query.find_by_id(&self.markup.secondary_list_id)
    }

    /// Rendered copies in order: primary, then secondary.
    pub fn roots(&self) -> Vec<NodeRef> {
        self.primary_root()
            .into_iter()
            .chain(self.secondary_root())
            .collect()
    }

    pub fn items(&self, root: &NodeRef) -> Vec<NodeRef> {
        self.query
            .find_all_within(root, &format!(".{}", self.markup.item_class))
    }

    pub fn item_id(&self, item: &NodeRef) -> String {
        item.attr(&self.markup.target_attribute)
            .unwrap_or_default()
    }

    pub fn item_title(&self, item: &NodeRef) -> String {
        self.query
            .find_within(item, &format!(".{}", self.markup.title_class))
            .map(|title| title.trimmed_text())
            .unwrap_or_default()
    }

    /// Items carrying `target_id`, across all copies.
    pub fn items_for(&self, target_id: &str) -> Vec<NodeRef> {
        self.roots()
            .iter()
            .flat_map(|root| self.items(root))
            .filter(|item| self.item_id(item) == target_id)
            .collect()
    }

    /// The list item an event happened on, taken from its composed path.
    pub fn item_for_event(&self, event: &DomEvent) -> Option<NodeRef> {
        let selectors = compile(&format!(".{}", self.markup.item_class))?;
        event
            .composed_path()
            .into_iter()
            .find(|node| node.matches(&selectors))
    }

    pub fn event_in_secondary(&self, event: &DomEvent) -> bool {
        event
            .composed_path()
            .iter()
            .any(|node| node.html_id().as_deref() == Some(self.markup.secondary_list_id.as_str()))
    }

    pub fn selected_item(&self) -> Option<NodeRef> {
        self.query.find_first(&format!(
            ".{}.{}",
            self.markup.item_class, self.markup.selected_class
        ))
    }

    /// Marks `target_id` selected and everything else unselected, in every copy.
    pub fn mark_selected(&self, target_id: &str) {
        for root in self.roots() {
            for item in self.items(&root) {
                let selected = self.item_id(&item) == target_id;
                item.set_class(&self.markup.selected_class, selected);
            }
        }
    }

    pub fn clear_selection(&self) {
        for root in self.roots() {
            if let Some(container) = self
                .query
                .find_within(&root, &format!(".{}", self.markup.container_class))
            {
                container.remove_attr("data-selected");
            }
            for item in self.items(&root) {
                item.set_class(&self.markup.selected_class, false);
            }
        }
    }

    /// Selected id per copy, `None` where nothing is selected.
    pub fn selected_ids(&self) -> Vec<Option<String>> {
        self.roots()
            .iter()
            .map(|root| {
                self.items(root)
                    .into_iter()
                    .find(|item| item.has_class(&self.markup.selected_class))
                    .map(|item| self.item_id(&item))
            })
            .collect()
    }

    pub fn remove_item(&self, target_id: &str) -> usize {
        let items = self.items_for(target_id);
        for item in &items {
            item.detach();
        }
        items.len()
    }

    pub fn update_title(&self, target_id: &str, title: &str) {
        for item in self.items_for(target_id) {
            if let Some(node) = self
                .query
                .find_within(&item, &format!(".{}", self.markup.title_class))
            {
                let existing: Vec<NodeRef> = node.children().collect();
                for child in existing {
                    child.detach();
                }
                node.append(NodeRef::new_text(title));
            }
        }
    }
}
