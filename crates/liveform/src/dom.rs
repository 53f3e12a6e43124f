// File: src/dom.rs
// Purpose: In-memory page model the validator reads from and writes to
//
// A `Document` is an arena of elements addressed by `NodeId`. `Page` is the
// shared handle handed to validators and event handlers; handlers always run
// with the document unlocked so they can read and mutate it freely.

use crate::error::SelectorError;
use crate::selector::Selector;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    attributes: Vec<(String, String)>,
    classes: Vec<String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The `name` attribute, when present and non-empty.
    pub fn name(&self) -> Option<&str> {
        self.attribute("name").filter(|n| !n.is_empty())
    }

    /// The `type` attribute of an input, lowercased (`text` when absent).
    pub fn input_type(&self) -> String {
        self.attribute("type")
            .map(|t| t.to_ascii_lowercase())
            .unwrap_or_else(|| "text".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Blur,
    Input,
    Change,
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub target: NodeId,
}

pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Clone)]
struct Listener {
    node: NodeId,
    kind: EventKind,
    handler: EventHandler,
}

/// The page: a tree of elements under a `<html>` root with a `<head>` and
/// a `<body>`, plus the event listeners registered on its elements.
pub struct Document {
    nodes: Vec<Element>,
    head: NodeId,
    body: NodeId,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: u64,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![Element::new("html")],
            head: NodeId(0),
            body: NodeId(0),
            listeners: BTreeMap::new(),
            next_listener: 1,
        };
        let root = doc.root();
        doc.head = doc.append_element(root, "head", &[]);
        doc.body = doc.append_element(root, "body", &[]);
        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0)
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0)
    }

    // ---- tree building ----

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    ///
    /// Returns `false` and leaves the tree alone when either node is unknown
    /// or `parent` sits inside `child`'s subtree (that would form a cycle).
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.element(parent).is_none() || self.element(child).is_none() {
            return false;
        }
        if self.is_inclusive_ancestor(child, parent) {
            return false;
        }
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        true
    }

    /// Whether `ancestor` is `node` itself or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(next) = current {
            if next == ancestor {
                return true;
            }
            current = self.parent(next);
        }
        false
    }

    /// Create an element with attributes and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let node = self.create_element(tag);
        for (name, value) in attrs {
            self.set_attribute(node, name, value);
        }
        self.append_child(parent, node);
        node
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node).and_then(|el| el.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.element(node)
            .map(|el| el.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn next_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    /// All descendants of `node` in document order, excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    // ---- attributes, classes, text ----

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.attribute(name))
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let Some(el) = self.element_mut(node) else {
            return;
        };
        if name == "class" {
            el.classes = value.split_whitespace().map(str::to_string).collect();
        }
        match el.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => el.attributes.push((name, value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attributes.retain(|(k, _)| k != name);
            if name == "class" {
                el.classes.clear();
            }
        }
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node).is_some_and(|el| el.has_class(class))
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if let Some(el) = self.element_mut(node) {
            if !el.has_class(class) {
                el.classes.push(class.to_string());
                sync_class_attribute(el);
            }
        }
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        if let Some(el) = self.element_mut(node) {
            if el.has_class(class) {
                el.classes.retain(|c| c != class);
                sync_class_attribute(el);
            }
        }
    }

    pub fn text(&self, node: NodeId) -> &str {
        self.element(node).map(Element::text).unwrap_or("")
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(el) = self.element_mut(node) {
            el.text = text.to_string();
        }
    }

    /// Convenience for tests and embedders simulating user input.
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        self.set_attribute(node, "value", value);
    }

    // ---- queries ----

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        self.query_selector_all_in(self.root(), selector)
    }

    /// First descendant of `scope` matching `selector`.
    pub fn query_selector_in(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query_selector_all_in(scope, selector)?.into_iter().next())
    }

    pub fn query_selector_all_in(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .descendants(scope)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect())
    }

    // ---- form fields ----

    /// Named `input`/`select`/`textarea` elements inside `form`.
    pub fn named_fields(&self, form: NodeId) -> Vec<NodeId> {
        self.descendants(form)
            .into_iter()
            .filter(|node| {
                self.element(*node).is_some_and(|el| {
                    matches!(el.tag.as_str(), "input" | "select" | "textarea") && el.name().is_some()
                })
            })
            .collect()
    }

    /// Current value of a field, following form submission rules:
    /// `None` for disabled fields and unchecked checkboxes/radios.
    pub fn field_value(&self, node: NodeId) -> Option<String> {
        let el = self.element(node)?;
        if el.attribute("disabled").is_some() {
            return None;
        }

        match el.tag.as_str() {
            "textarea" => Some(
                el.attribute("value")
                    .map(str::to_string)
                    .unwrap_or_else(|| el.text.clone()),
            ),
            "select" => {
                let options: Vec<NodeId> = self
                    .descendants(node)
                    .into_iter()
                    .filter(|n| self.element(*n).is_some_and(|o| o.tag == "option"))
                    .collect();
                let chosen = options
                    .iter()
                    .find(|o| self.attribute(**o, "selected").is_some())
                    .or_else(|| options.first());
                match chosen {
                    Some(option) => Some(
                        self.attribute(*option, "value")
                            .map(str::to_string)
                            .unwrap_or_else(|| self.text(*option).to_string()),
                    ),
                    None => Some(el.attribute("value").unwrap_or("").to_string()),
                }
            }
            _ => match el.input_type().as_str() {
                "checkbox" | "radio" => el
                    .attribute("checked")
                    .map(|_| el.attribute("value").unwrap_or("on").to_string()),
                _ => Some(el.attribute("value").unwrap_or("").to_string()),
            },
        }
    }

    /// Every submittable field value in `form`; later duplicates win.
    pub fn form_values(&self, form: NodeId) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        for node in self.named_fields(form) {
            let Some(el) = self.element(node) else {
                continue;
            };
            if matches!(el.input_type().as_str(), "submit" | "button" | "reset") && el.tag == "input"
            {
                continue;
            }
            if let (Some(name), Some(value)) = (el.name(), self.field_value(node)) {
                values.insert(name.to_string(), value);
            }
        }
        values
    }

    // ---- events ----

    pub fn add_event_listener(
        &mut self,
        node: NodeId,
        kind: EventKind,
        handler: EventHandler,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id, Listener { node, kind, handler });
        id
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn listener_count(&self, node: NodeId, kind: EventKind) -> usize {
        self.listeners
            .values()
            .filter(|l| l.node == node && l.kind == kind)
            .count()
    }

    fn handlers_for(&self, node: NodeId, kind: EventKind) -> Vec<EventHandler> {
        self.listeners
            .values()
            .filter(|l| l.node == node && l.kind == kind)
            .map(|l| l.handler.clone())
            .collect()
    }
}

fn sync_class_attribute(el: &mut Element) {
    let joined = el.classes.join(" ");
    match el.attributes.iter_mut().find(|(k, _)| k == "class") {
        Some(slot) => slot.1 = joined,
        None => el.attributes.push(("class".to_string(), joined)),
    }
}

/// Shared, thread-safe handle on a `Document`.
#[derive(Clone, Default)]
pub struct Page {
    doc: Arc<Mutex<Document>>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Page").field(&*self.lock()).finish()
    }
}

impl Page {
    pub fn new(doc: Document) -> Self {
        Self {
            doc: Arc::new(Mutex::new(doc)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Document> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.lock())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.lock())
    }

    /// Fire `kind` on `target`. Returns how many handlers ran.
    pub fn dispatch(&self, target: NodeId, kind: EventKind) -> usize {
        let handlers = self.lock().handlers_for(target, kind);
        let event = Event { kind, target };
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }
}
