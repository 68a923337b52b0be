//! Selector queries that see through shadow boundaries.

use std::collections::HashSet;
use std::hash::Hash;
use std::ops::ControlFlow;
use std::rc::Rc;

use kuchiki::{NodeRef, Selectors};
use tracing::debug;

use crate::dom::{Document, ElementExt, NodeKey};

/// A tree whose nodes may host an encapsulated sub-tree next to their
/// ordinary children.
pub trait EncapsulatedTree {
    type Node: Clone;
    type Key: Hash + Eq;

    fn key(&self, node: &Self::Node) -> Self::Key;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    fn shadow_root(&self, node: &Self::Node) -> Option<Self::Node>;
}

/// Visits every node reachable from `root`, `root` included.
///
/// A boundary's light tree is visited in document order before any shadow
/// root hosted inside it; those are then walked depth-first in host order.
/// Nodes already seen are skipped, so self-referential trees terminate.
pub fn walk<T, B, F>(tree: &T, root: &T::Node, mut visit: F) -> Option<B>
where
    T: EncapsulatedTree,
    F: FnMut(&T::Node) -> ControlFlow<B>,
{
    let mut seen = HashSet::new();
    walk_boundary(tree, root.clone(), &mut seen, &mut visit)
}

fn walk_boundary<T, B, F>(
    tree: &T,
    boundary_root: T::Node,
    seen: &mut HashSet<T::Key>,
    visit: &mut F,
) -> Option<B>
where
    T: EncapsulatedTree,
    F: FnMut(&T::Node) -> ControlFlow<B>,
{
    let mut nested = Vec::new();
    let mut stack = vec![boundary_root];

    while let Some(node) = stack.pop() {
        if !seen.insert(tree.key(&node)) {
            continue;
        }
        if let ControlFlow::Break(found) = visit(&node) {
            return Some(found);
        }
        if let Some(shadow_root) = tree.shadow_root(&node) {
            nested.push(shadow_root);
        }
        let mut children = tree.children(&node);
        children.reverse();
        stack.extend(children);
    }

    for shadow_root in nested {
        if let Some(found) = walk_boundary(tree, shadow_root, seen, visit) {
            return Some(found);
        }
    }
    None
}

impl EncapsulatedTree for Document {
    type Node = NodeRef;
    type Key = NodeKey;

    fn key(&self, node: &NodeRef) -> NodeKey {
        NodeKey::of(node)
    }

    fn children(&self, node: &NodeRef) -> Vec<NodeRef> {
        node.children().collect()
    }

    fn shadow_root(&self, node: &NodeRef) -> Option<NodeRef> {
        Document::shadow_root(self, node)
    }
}

/// Deep `querySelector` over a [`Document`].
#[derive(Clone)]
pub struct DeepQuery {
    document: Rc<Document>,
    app_root: String,
}

impl DeepQuery {
    pub fn new(document: Rc<Document>, app_root: impl Into<String>) -> Self {
        Self {
            document,
            app_root: app_root.into(),
        }
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    /// The configured application root, when it is rendered.
    pub fn app_root(&self) -> Option<NodeRef> {
        let selectors = compile(&self.app_root)?;
        self.first_match(&self.document.root(), &selectors)
    }

    /// First match below the application root, then below the whole document.
    pub fn find_first(&self, selector: &str) -> Option<NodeRef> {
        let selectors = compile(selector)?;
        if let Some(app_root) = self.app_root() {
            if let Some(found) = self.first_match(&app_root, &selectors) {
                return Some(found);
            }
        }
        self.first_match(&self.document.root(), &selectors)
    }

    pub fn find_within(&self, root: &NodeRef, selector: &str) -> Option<NodeRef> {
        let selectors = compile(selector)?;
        self.first_match(root, &selectors)
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeRef> {
        let root = self.document.root();
        let start = NodeKey::of(&root);
        walk(self.document.as_ref(), &root, |node| {
            if NodeKey::of(node) != start && node.html_id().as_deref() == Some(id) {
                ControlFlow::Break(node.clone())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Every match below the application root, or below the document when
    /// the application root is absent.
    pub fn find_all(&self, selector: &str) -> Vec<NodeRef> {
        let Some(selectors) = compile(selector) else {
            return Vec::new();
        };
        let root = self.app_root().unwrap_or_else(|| self.document.root());
        self.all_matches(&root, &selectors)
    }

    pub fn find_all_within(&self, root: &NodeRef, selector: &str) -> Vec<NodeRef> {
        let Some(selectors) = compile(selector) else {
            return Vec::new();
        };
        self.all_matches(root, &selectors)
    }

    fn first_match(&self, root: &NodeRef, selectors: &Selectors) -> Option<NodeRef> {
        let start = NodeKey::of(root);
        walk(self.document.as_ref(), root, |node| {
            if NodeKey::of(node) != start && node.matches(selectors) {
                ControlFlow::Break(node.clone())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    fn all_matches(&self, root: &NodeRef, selectors: &Selectors) -> Vec<NodeRef> {
        let start = NodeKey::of(root);
        let mut found = Vec::new();
        walk::<_, (), _>(self.document.as_ref(), root, |node| {
            if NodeKey::of(node) != start && node.matches(selectors) {
                found.push(node.clone());
            }
            ControlFlow::Continue(())
        });
        found
    }
}

pub(crate) fn compile(selector: &str) -> Option<Selectors> {
    match Selectors::compile(selector) {
        Ok(selectors) => Some(selectors),
        Err(()) => {
            debug!(target = "thread_bridge::query", %selector, "invalid selector");
            None
        }
    }
}
