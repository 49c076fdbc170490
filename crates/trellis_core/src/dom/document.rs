//! Node arena

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use slotmap::{new_key_type, Key, KeyData, SlotMap};
use smallvec::SmallVec;

use super::event::{DomEvent, DomListener};
use super::selector::{Combinator, Complex, Compound, SelectorList, Simple};
use crate::error::DomError;

new_key_type! {
    /// Identifier of a node inside a [`Document`]
    pub struct NodeId;
}

impl NodeId {
    /// Raw representation, stable for the node's lifetime
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    pub fn from_raw(raw: u64) -> Self {
        NodeId::from(KeyData::from_ffi(raw))
    }
}

/// Identifier of a registered event listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Fragment,
    Element { tag: String },
}

struct Node {
    kind: NodeKind,
    attributes: IndexMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: SmallVec<[(ListenerId, String, DomListener); 2]>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: IndexMap::new(),
            parent: None,
            children: Vec::new(),
            listeners: SmallVec::new(),
        }
    }
}

struct Tree {
    nodes: SlotMap<NodeId, Node>,
    root: NodeId,
    body: NodeId,
    next_listener: u64,
}

/// In-memory document tree
///
/// Cloning yields another handle to the same tree. All operations are
/// synchronous; listeners run after the tree borrow is released so they may
/// freely mutate the document.
#[derive(Clone)]
pub struct Document {
    tree: Rc<RefCell<Tree>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with a `body` element
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new(NodeKind::Document));
        let mut body_node = Node::new(NodeKind::Element {
            tag: "body".to_string(),
        });
        body_node.parent = Some(root);
        let body = nodes.insert(body_node);
        nodes[root].children.push(body);

        Self {
            tree: Rc::new(RefCell::new(Tree {
                nodes,
                root,
                body,
                next_listener: 0,
            })),
        }
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        self.tree.borrow().root
    }

    pub fn body(&self) -> NodeId {
        self.tree.borrow().body
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create a detached element
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.tree.borrow_mut().nodes.insert(Node::new(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
        }))
    }

    /// Create a detached fragment container
    pub fn create_fragment(&self) -> NodeId {
        self.tree
            .borrow_mut()
            .nodes
            .insert(Node::new(NodeKind::Fragment))
    }

    /// Create an element and append it to `parent`
    pub fn append_element(&self, parent: NodeId, tag: &str) -> Result<NodeId, DomError> {
        let node = self.create_element(tag);
        self.append_child(parent, node)?;
        Ok(node)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn exists(&self, node: NodeId) -> bool {
        self.tree.borrow().nodes.contains_key(node)
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.tree.borrow().nodes.get(node).map(|n| n.kind.clone())
    }

    /// Element-check predicate
    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(
            self.tree.borrow().nodes.get(node).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        match self.tree.borrow().nodes.get(node).map(|n| &n.kind) {
            Some(NodeKind::Element { tag }) => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.borrow().nodes.get(node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .borrow()
            .nodes
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Inclusive containment, like `Node.contains`
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let tree = self.tree.borrow();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = tree.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree
            .borrow()
            .nodes
            .get(node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.tree
            .borrow()
            .nodes
            .get(node)
            .is_some_and(|n| n.attributes.contains_key(name))
    }

    /// Attribute pairs in insertion order
    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.tree
            .borrow()
            .nodes
            .get(node)
            .map(|n| {
                n.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut tree = self.tree.borrow_mut();
        let node = tree.nodes.get_mut(node).ok_or(DomError::UnknownNode)?;
        node.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree
            .borrow_mut()
            .nodes
            .get_mut(node)
            .and_then(|n| n.attributes.shift_remove(name))
    }

    pub fn id(&self, node: NodeId) -> Option<String> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        if self.has_class(node, class) {
            return Ok(());
        }
        let classes = match self.attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &classes)
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Append `child` to `parent`, detaching it from its previous parent
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let mut tree = self.tree.borrow_mut();
        Self::check_insert(&tree, parent, child)?;
        Self::detach(&mut tree, child);
        tree.nodes[parent].children.push(child);
        tree.nodes[child].parent = Some(parent);
        Ok(())
    }

    /// Put `new_child` in place of `old_child` under `parent`
    pub fn replace_child(
        &self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> Result<(), DomError> {
        let mut tree = self.tree.borrow_mut();
        Self::check_insert(&tree, parent, new_child)?;
        if tree.nodes.get(old_child).and_then(|n| n.parent) != Some(parent) {
            return Err(DomError::NotAChild);
        }
        if new_child == old_child {
            return Ok(());
        }
        Self::detach(&mut tree, new_child);
        let index = tree.nodes[parent]
            .children
            .iter()
            .position(|&c| c == old_child)
            .ok_or(DomError::NotAChild)?;
        tree.nodes[parent].children[index] = new_child;
        tree.nodes[new_child].parent = Some(parent);
        tree.nodes[old_child].parent = None;
        Ok(())
    }

    /// Detach a node from its parent; the subtree stays alive
    pub fn remove(&self, node: NodeId) {
        let mut tree = self.tree.borrow_mut();
        if tree.nodes.contains_key(node) {
            Self::detach(&mut tree, node);
        }
    }

    fn check_insert(tree: &Tree, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !tree.nodes.contains_key(parent) || !tree.nodes.contains_key(child) {
            return Err(DomError::UnknownNode);
        }
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return Err(DomError::Hierarchy);
            }
            current = tree.nodes[id].parent;
        }
        Ok(())
    }

    fn detach(tree: &mut Tree, node: NodeId) {
        if let Some(parent) = tree.nodes[node].parent.take() {
            if let Some(p) = tree.nodes.get_mut(parent) {
                p.children.retain(|&c| c != node);
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// First descendant of `root` matching `selector`, in document order
    pub fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let list = SelectorList::parse(selector)?;
        let tree = self.tree.borrow();
        let mut found = None;
        Self::walk(&tree, root, &mut |id| {
            if Self::matches_list(&tree, id, &list) {
                found = Some(id);
                return false;
            }
            true
        });
        Ok(found)
    }

    /// Every descendant of `root` matching `selector`, in document order
    pub fn query_selector_all(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let list = SelectorList::parse(selector)?;
        let tree = self.tree.borrow();
        let mut found = Vec::new();
        Self::walk(&tree, root, &mut |id| {
            if Self::matches_list(&tree, id, &list) {
                found.push(id);
            }
            true
        });
        Ok(found)
    }

    /// Pre-order walk over descendants; the visitor returns false to stop
    fn walk(tree: &Tree, root: NodeId, visit: &mut dyn FnMut(NodeId) -> bool) {
        let Some(node) = tree.nodes.get(root) else {
            return;
        };
        let mut stack: Vec<NodeId> = node.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !visit(id) {
                return;
            }
            stack.extend(tree.nodes[id].children.iter().rev().copied());
        }
    }

    fn matches_list(tree: &Tree, node: NodeId, list: &SelectorList) -> bool {
        list.0.iter().any(|complex| Self::matches_complex(tree, node, complex))
    }

    fn matches_complex(tree: &Tree, node: NodeId, complex: &Complex) -> bool {
        // Right to left: the last compound must match the node itself
        let mut parts: Vec<(&Compound, Option<Combinator>)> = Vec::with_capacity(complex.tail.len() + 1);
        parts.push((&complex.head, None));
        for (combinator, compound) in &complex.tail {
            parts.push((compound, Some(*combinator)));
        }
        Self::matches_from(tree, node, &parts)
    }

    fn matches_from(tree: &Tree, node: NodeId, parts: &[(&Compound, Option<Combinator>)]) -> bool {
        let Some(((compound, combinator), rest)) = parts.split_last() else {
            return true;
        };
        if !Self::matches_compound(tree, node, compound) {
            return false;
        }
        let Some(combinator) = combinator else {
            return true;
        };
        let mut ancestor = tree.nodes[node].parent;
        match combinator {
            Combinator::Child => {
                ancestor.is_some_and(|parent| Self::matches_from(tree, parent, rest))
            }
            Combinator::Descendant => {
                while let Some(id) = ancestor {
                    if Self::matches_from(tree, id, rest) {
                        return true;
                    }
                    ancestor = tree.nodes[id].parent;
                }
                false
            }
        }
    }

    fn matches_compound(tree: &Tree, node: NodeId, compound: &Compound) -> bool {
        let node = &tree.nodes[node];
        let NodeKind::Element { tag } = &node.kind else {
            return false;
        };
        if compound.tag.as_ref().is_some_and(|t| t != tag) {
            return false;
        }
        compound.simple.iter().all(|simple| match simple {
            Simple::Id(id) => node.attributes.get("id") == Some(id),
            Simple::Class(class) => node
                .attributes
                .get("class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class)),
            Simple::Attribute { name, value } => match (node.attributes.get(name), value) {
                (Some(_), None) => true,
                (Some(actual), Some(expected)) => actual == expected,
                (None, _) => false,
            },
        })
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a listener for `event_type` on `node`
    pub fn add_event_listener(
        &self,
        node: NodeId,
        event_type: &str,
        listener: DomListener,
    ) -> Result<ListenerId, DomError> {
        let mut tree = self.tree.borrow_mut();
        tree.next_listener += 1;
        let id = ListenerId(tree.next_listener);
        let node = tree.nodes.get_mut(node).ok_or(DomError::UnknownNode)?;
        node.listeners.push((id, event_type.to_string(), listener));
        Ok(id)
    }

    /// Remove a listener; returns false if it was not registered on `node`
    pub fn remove_event_listener(&self, node: NodeId, listener: ListenerId) -> bool {
        let mut tree = self.tree.borrow_mut();
        let Some(node) = tree.nodes.get_mut(node) else {
            return false;
        };
        let before = node.listeners.len();
        node.listeners.retain(|(id, _, _)| *id != listener);
        node.listeners.len() != before
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.tree
            .borrow()
            .nodes
            .get(node)
            .map_or(0, |n| n.listeners.len())
    }

    /// Dispatch an event at `target`, bubbling up to the document node
    pub fn dispatch_event(&self, target: NodeId, event_type: &str) -> DomEvent {
        let event = DomEvent::new(event_type, target);
        let mut current = Some(target);
        while let Some(node) = current {
            let (listeners, parent) = {
                let tree = self.tree.borrow();
                let Some(n) = tree.nodes.get(node) else {
                    break;
                };
                let listeners: SmallVec<[DomListener; 2]> = n
                    .listeners
                    .iter()
                    .filter(|(_, ty, _)| ty == event_type)
                    .map(|(_, _, l)| l.clone())
                    .collect();
                (listeners, n.parent)
            };
            event.set_current_target(node);
            for listener in &listeners {
                listener(&event);
            }
            if event.propagation_stopped() {
                break;
            }
            current = parent;
        }
        event
    }
}
