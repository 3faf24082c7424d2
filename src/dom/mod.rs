//! In-memory page model.
//!
//! A `Document` is an arena of nodes addressed by `NodeId`. Detached nodes
//! stay in the arena until the document is dropped, which is fine for the
//! lifetime of one page load.

mod parse;
mod select;

pub use select::Selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    /// Synthetic root. Serializes as its children only.
    Root,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

pub(crate) fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Build a document from markup. Never fails; malformed input is read
    /// as best as possible, like a browser would.
    pub fn parse(markup: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.root();
        parse::parse_into(&mut doc, root, markup);
        doc
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    /// Shorthand for an element with a single class, the most common shape
    /// when building the menu.
    pub fn create_element_with_class(&mut self, tag: &str, class: &str) -> NodeId {
        let id = self.create_element(tag);
        self.set_attr(id, "class", class);
        id
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    /// Append `child` as the last child of `parent`, detaching it from its
    /// current parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn remove_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Pre-order walk over every node below `node`, excluding `node` itself.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// No-op on non-element nodes.
    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[node.0].data {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn classes(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.attr(node, "class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).any(|c| c == class)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) {
        if self.tag(node).is_none() || self.has_class(node, class) {
            return;
        }
        let value = match self.attr(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr(node, "class", &value);
    }

    pub fn text_content(&self, node: NodeId) -> String {
        if let NodeData::Text(text) = &self.nodes[node.0].data {
            return text.clone();
        }
        self.descendants(node)
            .into_iter()
            .filter_map(|n| match &self.nodes[n.0].data {
                NodeData::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) {
        if let NodeData::Text(existing) = &mut self.nodes[node.0].data {
            *existing = text.to_string();
            return;
        }
        self.remove_children(node);
        if !text.is_empty() {
            let text = self.create_text(text);
            self.append_child(node, text);
        }
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Replace all children with the nodes parsed from `markup`.
    pub fn set_inner_html(&mut self, node: NodeId, markup: &str) {
        self.remove_children(node);
        parse::parse_into(self, node, markup);
    }

    pub fn to_html(&self) -> String {
        self.inner_html(self.root())
    }

    pub fn query_selector(&self, scope: NodeId, selector: &str) -> Option<NodeId> {
        let selector = Selector::parse(selector)?;
        self.descendants(scope)
            .into_iter()
            .find(|n| selector.matches(self, *n))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &str) -> Vec<NodeId> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        self.descendants(scope)
            .into_iter()
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let n = &self.nodes[node.0];
        match &n.data {
            NodeData::Root => {
                for child in &n.children {
                    self.write_html(*child, out);
                }
            }
            NodeData::Text(text) => {
                let raw = n
                    .parent
                    .and_then(|p| self.tag(p))
                    .is_some_and(is_raw_text);
                if raw {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if is_void(tag) {
                    return;
                }
                for child in &n.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

/// Escape text for inclusion in markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(text, false, &mut out);
    out
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[test]
fn test_build_and_serialize() {
    let mut doc = Document::new();
    let root = doc.root();
    let div = doc.create_element_with_class("div", "menu-item");
    let p = doc.create_element("p");
    doc.set_text_content(p, "Fish & Chips <large>");
    let img = doc.create_element("img");
    doc.set_attr(img, "alt", "say \"hi\"");
    doc.append_child(root, div);
    doc.append_child(div, p);
    doc.append_child(div, img);

    assert_eq!(
        doc.to_html(),
        r#"<div class="menu-item"><p>Fish &amp; Chips &lt;large&gt;</p><img alt="say &quot;hi&quot;"></div>"#
    );
    assert_eq!(doc.text_content(div), "Fish & Chips <large>");
}

#[test]
fn test_append_moves_node() {
    let mut doc = Document::new();
    let root = doc.root();
    let a = doc.create_element("div");
    let b = doc.create_element("div");
    let child = doc.create_element("span");
    doc.append_child(root, a);
    doc.append_child(root, b);
    doc.append_child(a, child);
    doc.append_child(b, child);

    assert!(doc.children(a).is_empty());
    assert_eq!(doc.children(b), &[child]);
    assert_eq!(doc.parent(child), Some(b));
}

#[test]
fn test_classes() {
    let mut doc = Document::new();
    let div = doc.create_element_with_class("div", "menu-item");
    doc.add_class(div, "has-image");
    doc.add_class(div, "has-image");
    assert_eq!(doc.attr(div, "class"), Some("menu-item has-image"));
    assert!(doc.has_class(div, "menu-item"));
    assert!(!doc.has_class(div, "no-image"));

    let text = doc.create_text("plain");
    doc.add_class(text, "ignored");
    assert_eq!(doc.attr(text, "class"), None);
}

#[test]
fn test_set_inner_html_replaces_children() {
    let mut doc = Document::parse("<p>old <b>text</b></p>");
    let p = doc.query_selector(doc.root(), "p").unwrap();
    doc.set_inner_html(p, "1 Main St<br>Town");
    assert_eq!(doc.inner_html(p), "1 Main St<br>Town");
    assert_eq!(doc.text_content(p), "1 Main StTown");
}
