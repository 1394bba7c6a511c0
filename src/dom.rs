//! Minimal retained document: elements, text nodes, and fragments.
//!
//! Only the parts of a browser document the employee view touches are
//! modelled: tag names, an optional id, a class list, `data-*` attributes,
//! form `value`/`disabled` state, and ordered children.

use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const SELECT_MENU_ID: &str = "selectMenu";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Node::Element(element) => element.text_content(),
            Node::Text(text) => text.clone(),
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_html(out),
            Node::Text(text) => out.push_str(&escape(text)),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    dataset: BTreeMap<String, String>,
    value: Option<String>,
    disabled: bool,
    children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn class_name(&self) -> String {
        self.classes.join(" ")
    }

    /// Replaces the class list with the whitespace separated names in `names`.
    pub fn set_class_name(&mut self, names: &str) {
        self.classes = names.split_whitespace().map(str::to_string).collect();
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|class| class == name)
    }

    pub fn add_class(&mut self, name: &str) {
        if !self.has_class(name) {
            self.classes.push(name.to_string());
        }
    }

    pub fn remove_class(&mut self, name: &str) {
        self.classes.retain(|class| class != name);
    }

    pub fn set_data(&mut self, key: &str, value: impl Into<String>) {
        self.dataset.insert(key.to_string(), value.into());
    }

    pub fn data(&self, key: &str) -> Option<&str> {
        self.dataset.get(key).map(String::as_str)
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Replaces every child with a single text node, like `textContent = ..`.
    pub fn set_text_content(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(Node::Text(text));
        }
    }

    pub fn text_content(&self) -> String {
        self.children.iter().map(Node::text_content).collect()
    }

    pub fn append(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    pub fn append_fragment(&mut self, fragment: Fragment) {
        self.children.extend(fragment.nodes);
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Removes every child node and returns how many were removed.
    pub fn delete_children(&mut self) -> usize {
        let removed = self.children.len();
        self.children.clear();
        removed
    }

    /// Depth-first list of descendant elements with `tag`.
    pub fn descendants_by_tag(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_by_tag(tag, &mut found);
        found
    }

    fn collect_by_tag<'a>(&'a self, tag: &str, found: &mut Vec<&'a Element>) {
        for child in self.element_children() {
            if child.tag == tag {
                found.push(child);
            }
            child.collect_by_tag(tag, found);
        }
    }

    /// First descendant element with `tag` whose `data-{key}` equals `value`.
    pub fn find_by_data_mut(&mut self, tag: &str, key: &str, value: &str) -> Option<&mut Element> {
        for child in self.children.iter_mut() {
            let Node::Element(element) = child else {
                continue;
            };
            if element.tag == tag && element.data(key) == Some(value) {
                return Some(element);
            }
            if let Some(found) = element.find_by_data_mut(tag, key, value) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_by_data(&self, tag: &str, key: &str, value: &str) -> Option<&Element> {
        for element in self.element_children() {
            if element.tag == tag && element.data(key) == Some(value) {
                return Some(element);
            }
            if let Some(found) = element.find_by_data(tag, key, value) {
                return Some(found);
            }
        }
        None
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let _ = write!(out, "<{}", self.tag);
        if let Some(id) = &self.id {
            let _ = write!(out, " id=\"{}\"", escape(id));
        }
        if !self.classes.is_empty() {
            let _ = write!(out, " class=\"{}\"", escape(&self.class_name()));
        }
        for (key, value) in &self.dataset {
            let _ = write!(out, " data-{}=\"{}\"", kebab(key), escape(value));
        }
        if let Some(value) = &self.value {
            let _ = write!(out, " value=\"{}\"", escape(value));
        }
        if self.disabled {
            out.push_str(" disabled");
        }
        out.push('>');
        for child in &self.children {
            child.write_html(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

/// Detached list of nodes that is spliced into a parent in one step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    nodes: Vec<Node>,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, node: impl Into<Node>) {
        self.nodes.push(node.into());
    }
}

/// The page: the employee dropdown and the `main` region posts render into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub select: Element,
    pub main: Element,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            select: Element::new("select").with_id(SELECT_MENU_ID),
            main: Element::new("main"),
        }
    }

    /// Buttons inside `main`, in document order.
    pub fn main_buttons(&self) -> Vec<&Element> {
        self.main.descendants_by_tag("button")
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn kebab(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 2);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
