use super::{is_raw_text, is_void, Document, NodeId};

/// Tolerant markup reader. Comments and doctypes are dropped, unknown end
/// tags are ignored and unclosed elements are closed at the end of input.
pub(super) fn parse_into(doc: &mut Document, parent: NodeId, markup: &str) {
    let mut stack: Vec<NodeId> = vec![parent];
    let mut rest = markup;
    let mut text = String::new();

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            text.push_str(rest);
            break;
        };
        text.push_str(&rest[..lt]);
        rest = &rest[lt..];

        if let Some(after) = rest.strip_prefix("<!--") {
            flush_text(doc, &stack, &mut text);
            rest = match after.find("-->") {
                Some(end) => &after[end + 3..],
                None => "",
            };
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            flush_text(doc, &stack, &mut text);
            rest = match rest.find('>') {
                Some(end) => &rest[end + 1..],
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("</") {
            let Some(end) = after.find('>') else {
                text.push_str(rest);
                break;
            };
            flush_text(doc, &stack, &mut text);
            let name = after[..end].trim().to_ascii_lowercase();
            close_element(doc, &mut stack, &name);
            rest = &after[end + 1..];
        } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let Some((tag, attrs, self_closing, consumed)) = read_start_tag(rest) else {
                text.push_str(rest);
                break;
            };
            flush_text(doc, &stack, &mut text);
            rest = &rest[consumed..];

            let node = doc.create_element(&tag);
            for (name, value) in &attrs {
                doc.set_attr(node, name, value);
            }
            let current = *stack.last().unwrap_or(&parent);
            doc.append_child(current, node);

            if is_raw_text(&tag) {
                let close = format!("</{tag}");
                let end = find_ignore_case(rest, &close).unwrap_or(rest.len());
                if end > 0 {
                    let body = doc.create_text(&rest[..end]);
                    doc.append_child(node, body);
                }
                rest = &rest[end..];
                rest = match rest.find('>') {
                    Some(gt) => &rest[gt + 1..],
                    None => "",
                };
            } else if !self_closing && !is_void(&tag) {
                stack.push(node);
            }
        } else {
            text.push('<');
            rest = &rest[1..];
        }
    }
    flush_text(doc, &stack, &mut text);
}

fn flush_text(doc: &mut Document, stack: &[NodeId], text: &mut String) {
    if text.is_empty() {
        return;
    }
    let Some(current) = stack.last() else { return };
    let node = doc.create_text(&decode_entities(text));
    doc.append_child(*current, node);
    text.clear();
}

fn close_element(doc: &Document, stack: &mut Vec<NodeId>, name: &str) {
    // stack[0] is the insertion point and is never popped
    let Some(pos) = stack
        .iter()
        .skip(1)
        .rposition(|n| doc.tag(*n) == Some(name))
    else {
        return;
    };
    stack.truncate(pos + 1);
}

type StartTag = (String, Vec<(String, String)>, bool, usize);

/// Reads `<tag attr="v" ...>` at the start of `input`. Returns the tag name,
/// its attributes, whether it was written self-closing and how many bytes
/// were consumed.
fn read_start_tag(input: &str) -> Option<StartTag> {
    let bytes = input.as_bytes();
    let mut i = 1;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' && bytes[i] != b'/'
    {
        i += 1;
    }
    let tag = input[1..i].to_ascii_lowercase();
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => return Some((tag, attrs, self_closing, i + 1)),
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => {}
        }

        let start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = input[start..i].to_ascii_lowercase();
        self_closing = false;

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut value = String::new();
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i)? {
                quote @ (b'"' | b'\'') => {
                    let close = input[i + 1..].find(*quote as char)? + i + 1;
                    value = decode_entities(&input[i + 1..close]);
                    i = close + 1;
                }
                _ => {
                    let start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = decode_entities(&input[start..i]);
                }
            }
        }
        if !name.is_empty() && !attrs.iter().any(|(k, _)| *k == name) {
            attrs.push((name, value));
        }
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                        None => num.parse().ok()?,
                    };
                    char::from_u32(code)
                }),
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[test]
fn test_parse_page_fragment() {
    let html = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Diner</title>
<link rel="stylesheet" href="styles.css"></head>
<body>
<!-- menu -->
<section id="menu"><div class="container"><h2 class='neon-text'>Menu</h2><p>Static</p></div></section>
<script>if (a < b) { go(); }</script>
</body></html>"#;
    let doc = Document::parse(html);
    let root = doc.root();

    let container = doc.query_selector(root, "#menu .container").unwrap();
    let h2 = doc.query_selector(container, "h2").unwrap();
    assert_eq!(doc.attr(h2, "class"), Some("neon-text"));
    assert_eq!(doc.text_content(h2), "Menu");

    let link = doc.query_selector(root, "link").unwrap();
    assert!(doc.children(link).is_empty());
    assert_eq!(doc.attr(link, "href"), Some("styles.css"));

    let script = doc.query_selector(root, "script").unwrap();
    assert_eq!(doc.inner_html(script), "if (a < b) { go(); }");
}

#[test]
fn test_entities_and_stray_markup() {
    let doc = Document::parse("<p>Mac &amp; Cheese &#36;5 &bogus; a < b</p></div><br/>");
    let p = doc.query_selector(doc.root(), "p").unwrap();
    assert_eq!(doc.text_content(p), "Mac & Cheese $5 &bogus; a < b");
    assert_eq!(
        doc.to_html(),
        "<p>Mac &amp; Cheese $5 &amp;bogus; a &lt; b</p><br>"
    );
}

#[test]
fn test_unclosed_elements_close_at_end() {
    let doc = Document::parse("<ul><li>one<li>two");
    assert_eq!(doc.to_html(), "<ul><li>one<li>two</li></li></ul>");
}
