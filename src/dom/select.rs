use super::{Document, NodeId};

/// Compound selector: `tag#id.class.class`, every part optional.
#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

/// Descendant-combinator selectors only (`#menu .container h2`). That is
/// all the page conventions rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    parts: Vec<Compound>,
}

impl Selector {
    pub fn parse(input: &str) -> Option<Self> {
        let parts = input
            .split_ascii_whitespace()
            .map(parse_compound)
            .collect::<Option<Vec<_>>>()?;
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some((last, ancestors)) = self.parts.split_last() else {
            return false;
        };
        if !last.matches(doc, node) {
            return false;
        }

        // right-to-left, each remaining part must match some further ancestor
        let mut current = doc.parent(node);
        for part in ancestors.iter().rev() {
            loop {
                let Some(candidate) = current else {
                    return false;
                };
                current = doc.parent(candidate);
                if part.matches(doc, candidate) {
                    break;
                }
            }
        }
        true
    }
}

fn parse_compound(input: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut rest = input;

    let tag_end = rest.find(['#', '.']).unwrap_or(rest.len());
    if tag_end > 0 {
        let tag = &rest[..tag_end];
        if tag != "*" {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
    }
    rest = &rest[tag_end..];

    while let Some(marker) = rest.chars().next() {
        let body = &rest[1..];
        let end = body.find(['#', '.']).unwrap_or(body.len());
        let name = &body[..end];
        if name.is_empty() {
            return None;
        }
        match marker {
            '#' => compound.id = Some(name.to_string()),
            _ => compound.classes.push(name.to_string()),
        }
        rest = &body[end..];
    }
    Some(compound)
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(tag) = doc.tag(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|t| t != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if doc.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| doc.has_class(node, c))
    }
}

#[test]
fn test_parse_selector() {
    let sel = Selector::parse("#menu  .container h2.neon-text").unwrap();
    assert_eq!(sel.parts.len(), 3);
    assert_eq!(sel.parts[0].id.as_deref(), Some("menu"));
    assert_eq!(sel.parts[1].classes, ["container"]);
    assert_eq!(sel.parts[2].tag.as_deref(), Some("h2"));
    assert_eq!(sel.parts[2].classes, ["neon-text"]);

    assert!(Selector::parse("").is_none());
    assert!(Selector::parse("div.").is_none());
}

#[test]
fn test_descendant_matching() {
    let doc = Document::parse(
        r#"<div class="info-item"><h4>Phone</h4><p id="a">x</p></div>
<div class="contact-details"><p id="b">y</p><div><p id="c">z</p></div></div>"#,
    );
    let root = doc.root();
    let ids = |sel: &str| {
        doc.query_selector_all(root, sel)
            .into_iter()
            .filter_map(|n| doc.attr(n, "id").map(str::to_string))
            .collect::<Vec<_>>()
    };

    assert_eq!(ids(".info-item p"), ["a"]);
    assert_eq!(ids(".contact-details p"), ["b", "c"]);
    assert_eq!(ids("div div p"), ["c"]);
    assert_eq!(ids("p#b"), ["b"]);
    assert!(ids("section p").is_empty());
}
