use tracing::debug;

use crate::data::MenuDocument;
use crate::dom::{escape_html, Document, NodeId};

/// The literal text each contact slot is expected to hold in the static
/// page. A slot is only rewritten when its markup still contains this text.
#[derive(Debug, Clone)]
pub struct ContactPatterns {
    /// Markup of the address in the about section, split over two lines.
    pub about_address: String,
    pub about_phone: String,
    pub contact_address: String,
    pub contact_phone: String,
}

impl Default for ContactPatterns {
    fn default() -> Self {
        Self {
            about_address: "136 East Main St<br>Welland, ON L3B 3W5".to_string(),
            about_phone: "(905) 735-4471".to_string(),
            contact_address: "136 East Main St, Welland, ON L3B 3W5".to_string(),
            contact_phone: "(905) 735-4471".to_string(),
        }
    }
}

/// Rewrite the address and phone shown in the about and contact sections.
/// Returns how many of the four slots were changed.
pub fn patch_contact_info(page: &mut Document, menu: &MenuDocument, patterns: &ContactPatterns) -> usize {
    let root = page.root();
    let about = page.query_selector_all(root, ".info-item p");
    let contact = page.query_selector_all(root, ".contact-details p");
    let mut patched = 0;

    if let Some(address) = menu.address.as_deref() {
        // "136 East Main St, Welland" -> "136 East Main St<br>Welland"
        let two_lines = match address.split_once(", ") {
            Some((street, rest)) => format!("{}<br>{}", escape_html(street), escape_html(rest)),
            None => escape_html(address),
        };
        patched += replace_in(page, about.first(), &patterns.about_address, &two_lines) as usize;
        patched += replace_in(
            page,
            contact.first(),
            &patterns.contact_address,
            &escape_html(address),
        ) as usize;
    }

    if let Some(phone) = menu.phone.as_deref() {
        let phone = escape_html(phone);
        patched += replace_in(page, about.get(2), &patterns.about_phone, &phone) as usize;
        patched += replace_in(page, contact.get(1), &patterns.contact_phone, &phone) as usize;
    }

    debug!(patched, "contact info patched");
    patched
}

fn replace_in(page: &mut Document, slot: Option<&NodeId>, expected: &str, replacement: &str) -> bool {
    let Some(&node) = slot else { return false };
    let markup = page.inner_html(node);
    if !markup.contains(expected) {
        return false;
    }
    let markup = markup.replacen(expected, replacement, 1);
    page.set_inner_html(node, &markup);
    true
}

#[cfg(test)]
const PAGE: &str = r#"
<section id="about">
  <div class="info-item"><h4>Where</h4><p>136 East Main St<br>Welland, ON L3B 3W5</p></div>
  <div class="info-item"><h4>Hours</h4><p>7am - 3pm</p></div>
  <div class="info-item"><h4>Call</h4><p>(905) 735-4471</p></div>
</section>
<section id="contact">
  <div class="contact-details">
    <p><strong>Address:</strong> 136 East Main St, Welland, ON L3B 3W5</p>
    <p><strong>Phone:</strong> (905) 735-4471</p>
  </div>
</section>"#;

#[cfg(test)]
fn menu(raw: &str) -> MenuDocument {
    serde_json::from_str(raw).unwrap()
}

#[test]
fn test_patch_all_slots() {
    let mut page = Document::parse(PAGE);
    let menu = menu(
        r#"{"address": "12 King St, St. Catharines, ON", "phone": "(905) 555-0199", "sections": {}}"#,
    );
    let patched = patch_contact_info(&mut page, &menu, &ContactPatterns::default());
    assert_eq!(patched, 4);

    let root = page.root();
    let about = page.query_selector_all(root, ".info-item p");
    assert_eq!(page.inner_html(about[0]), "12 King St<br>St. Catharines, ON");
    assert_eq!(page.inner_html(about[1]), "7am - 3pm");
    assert_eq!(page.inner_html(about[2]), "(905) 555-0199");

    let contact = page.query_selector_all(root, ".contact-details p");
    assert_eq!(
        page.inner_html(contact[0]),
        "<strong>Address:</strong> 12 King St, St. Catharines, ON"
    );
    assert_eq!(
        page.inner_html(contact[1]),
        "<strong>Phone:</strong> (905) 555-0199"
    );
}

#[test]
fn test_mismatch_is_left_alone() {
    let edited = PAGE
        .replace("(905) 735-4471</p></div>", "call us!</p></div>")
        .replace("136 East Main St, Welland", "136 E. Main St, Welland");
    let mut page = Document::parse(&edited);
    let before = page.to_html();

    let menu = menu(r#"{"address": "1 Elm St, Town", "phone": "555", "sections": {}}"#);
    let patched = patch_contact_info(&mut page, &menu, &ContactPatterns::default());
    // the about address and the contact phone still match
    assert_eq!(patched, 2);

    let root = page.root();
    let about = page.query_selector_all(root, ".info-item p");
    assert_eq!(page.inner_html(about[2]), "call us!");
    let contact = page.query_selector_all(root, ".contact-details p");
    assert!(page.inner_html(contact[0]).contains("136 E. Main St"));
    assert_ne!(page.to_html(), before);
}

#[test]
fn test_missing_fields_and_slots() {
    let mut page = Document::parse(PAGE);
    let before = page.to_html();
    let patched = patch_contact_info(&mut page, &menu(r#"{"sections": {}}"#), &ContactPatterns::default());
    assert_eq!(patched, 0);
    assert_eq!(page.to_html(), before);

    let mut bare = Document::parse("<p>136 East Main St, Welland, ON L3B 3W5</p>");
    let menu = menu(r#"{"address": "1 Elm St, Town", "phone": "555", "sections": {}}"#);
    assert_eq!(patch_contact_info(&mut bare, &menu, &ContactPatterns::default()), 0);
}

#[test]
fn test_inserted_text_is_escaped() {
    let mut page = Document::parse(PAGE);
    let menu = menu(r#"{"phone": "<b>call</b> & ask", "sections": {}}"#);
    patch_contact_info(&mut page, &menu, &ContactPatterns::default());

    let about = page.query_selector_all(page.root(), ".info-item p");
    assert_eq!(page.text_content(about[2]), "<b>call</b> & ask");
    assert!(page.query_selector(about[2], "b").is_none());
}
