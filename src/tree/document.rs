//! Arena-backed labeled tree document
//!
//! Elements live in a flat arena addressed by [`NodeId`]. Structure is expressed
//! through each element's ordered `children`; referents are plain strings stored in
//! the `referent` attribute and are never confused with arena indices. Detached
//! elements stay in the arena but are unreachable from the root, so every
//! traversal starts at [`Document::root`].

use std::collections::{HashMap, HashSet};

/// Tag of elements that form the item hierarchy
pub const ITEM_TAG: &str = "Item";
/// Tag of the property bag carried by each item
pub const PROPERTIES_TAG: &str = "Properties";
/// Tag of cross-reference properties
pub const REF_TAG: &str = "Ref";
/// Attribute holding an element's referent
pub const REFERENT_ATTR: &str = "referent";

/// Stable index of an element inside its owning [`Document`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered content of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Child element
    Element(NodeId),
    /// Character data, kept in its escaped source form
    Text(String),
    /// Comment, CDATA section or processing instruction, kept verbatim
    Markup(String),
}

/// A single element: tag, attributes in source order, ordered content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    /// Attribute name and raw (escaped) value pairs
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Content>,
    /// Written as `<tag/>` in the source; kept that way while it has no content
    pub self_closing: bool,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    /// Unescaped value of an attribute
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, raw)| unescape_lossy(raw))
    }

    /// Set an attribute, replacing an existing value in place.
    ///
    /// `value` is escaped before storage.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let raw = quick_xml::escape::escape(value).into_owned();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = raw,
            None => self.attributes.push((name.to_string(), raw)),
        }
    }

    /// Concatenated, unescaped character data directly inside this element
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|content| match content {
                Content::Text(raw) => Some(unescape_lossy(raw)),
                _ => None,
            })
            .collect()
    }

    /// Replace all character data with a single text node
    pub fn set_text(&mut self, value: &str) {
        self.children.retain(|content| !matches!(content, Content::Text(_)));
        self.children.insert(
            0,
            Content::Text(quick_xml::escape::partial_escape(value).into_owned()),
        );
    }
}

pub(crate) fn unescape_lossy(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// In-memory labeled tree document
#[derive(Debug, Clone)]
pub struct Document {
    elements: Vec<Element>,
    root: NodeId,
    /// Verbatim source preceding the root element
    pub(crate) prolog: String,
    /// Verbatim source following the root element
    pub(crate) epilog: String,
}

impl Document {
    /// Create a document holding only an empty root element
    pub fn new(root_tag: impl Into<String>) -> Self {
        Self {
            elements: vec![Element::new(root_tag)],
            root: NodeId(0),
            prolog: String::new(),
            epilog: String::new(),
        }
    }

    pub(crate) fn from_parts(
        elements: Vec<Element>,
        root: NodeId,
        prolog: String,
        epilog: String,
    ) -> Self {
        Self {
            elements,
            root,
            prolog,
            epilog,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn element(&self, id: NodeId) -> &Element {
        &self.elements[id.0]
    }

    pub fn element_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.elements[id.0]
    }

    /// Add a detached element to the arena
    pub fn alloc(&mut self, element: Element) -> NodeId {
        self.elements.push(element);
        NodeId(self.elements.len() - 1)
    }

    /// Child elements in document order
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.elements[id.0]
            .children
            .iter()
            .filter_map(|content| match content {
                Content::Element(child) => Some(*child),
                _ => None,
            })
    }

    /// First child element with the given tag
    pub fn first_child_tagged(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.child_elements(id)
            .find(|child| self.elements[child.0].tag == tag)
    }

    /// Child `<Item>` elements in document order
    pub fn child_items(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.child_elements(id)
            .filter(|child| self.elements[child.0].tag == ITEM_TAG)
    }

    /// All elements of a subtree in pre-order, starting with `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            let children: Vec<NodeId> = self.child_elements(current).collect();
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Name of an item, read from `Properties/string[@name="Name"]`.
    ///
    /// Returns `None` for items without a name property.
    pub fn item_name(&self, id: NodeId) -> Option<String> {
        let properties = self.first_child_tagged(id, PROPERTIES_TAG)?;
        self.child_elements(properties)
            .map(|prop| &self.elements[prop.0])
            .find(|prop| prop.tag == "string" && prop.attribute("name").as_deref() == Some("Name"))
            .map(Element::text)
    }

    pub fn referent(&self, id: NodeId) -> Option<String> {
        self.elements[id.0]
            .attribute(REFERENT_ATTR)
            .filter(|referent| !referent.is_empty())
    }

    pub fn set_referent(&mut self, id: NodeId, referent: &str) {
        self.elements[id.0].set_attribute(REFERENT_ATTR, referent);
    }

    /// Every referent reachable from the root
    pub fn collect_referents(&self) -> HashSet<String> {
        self.descendants(self.root)
            .into_iter()
            .filter_map(|id| self.referent(id))
            .collect()
    }

    /// Detach every item named `name` that sits directly under `parent`, or
    /// under `parent` through nameless intermediate items, together with the
    /// whitespace-only text that trails it. These are exactly the items
    /// [`PathIndex`](crate::tree::PathIndex) files one segment below `parent`.
    /// Returns the number of items detached.
    pub fn remove_child_items(&mut self, parent: NodeId, name: &str) -> usize {
        let mut doomed: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
        let mut stack = vec![parent];
        while let Some(owner) = stack.pop() {
            let children: Vec<NodeId> = self.child_items(owner).collect();
            for child in children {
                match self.item_name(child) {
                    Some(child_name) if child_name == name => {
                        doomed.entry(owner).or_default().insert(child);
                    }
                    Some(_) => {}
                    None => stack.push(child),
                }
            }
        }

        doomed
            .into_iter()
            .map(|(owner, children)| {
                self.detach_children(owner, &children);
                children.len()
            })
            .sum()
    }

    fn detach_children(&mut self, owner: NodeId, doomed: &HashSet<NodeId>) {
        let old = std::mem::take(&mut self.elements[owner.0].children);
        let mut kept = Vec::with_capacity(old.len());
        let mut drop_trailing_space = false;
        for content in old {
            match &content {
                Content::Element(child) if doomed.contains(child) => {
                    drop_trailing_space = true;
                    continue;
                }
                Content::Text(raw) if drop_trailing_space && raw.trim().is_empty() => {
                    drop_trailing_space = false;
                    continue;
                }
                _ => drop_trailing_space = false,
            }
            kept.push(content);
        }
        self.elements[owner.0].children = kept;
    }

    /// Append a detached element as the last child of `parent`
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let element = &mut self.elements[parent.0];
        element.self_closing = false;
        element.children.push(Content::Element(child));
    }

    /// Deep-copy a subtree of `source` into this arena. The copy is detached;
    /// `source` is left untouched.
    pub fn import_subtree(&mut self, source: &Document, node: NodeId) -> NodeId {
        let order = source.descendants(node);
        let first = self.elements.len();
        let mapped: HashMap<NodeId, NodeId> = order
            .iter()
            .enumerate()
            .map(|(offset, id)| (*id, NodeId(first + offset)))
            .collect();

        self.elements.reserve(order.len());
        for id in &order {
            let original = source.element(*id);
            let children = original
                .children
                .iter()
                .map(|content| match content {
                    Content::Element(child) => Content::Element(mapped[child]),
                    other => other.clone(),
                })
                .collect();
            self.elements.push(Element {
                tag: original.tag.clone(),
                attributes: original.attributes.clone(),
                children,
                self_closing: original.self_closing,
            });
        }
        NodeId(first)
    }
}
