use derive_builder::Builder;

use crate::data::{MenuDocument, MenuItem};
use crate::dom::{Document, NodeId};

/// Where the menu lives on the page and what to show when the page has no
/// heading of its own.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), default)]
pub struct PageLayout {
    pub container: String,
    pub default_heading: String,
    pub default_heading_class: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            container: "#menu .container".to_string(),
            default_heading: "Our Groovy Menu".to_string(),
            default_heading_class: "neon-text".to_string(),
        }
    }
}

/// An item block waiting for its photo probe.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedItem {
    pub name: String,
    pub node: NodeId,
}

/// Replace the container's content with the menu. The first `h2` inside the
/// container survives, every other child is dropped.
pub fn render_menu(
    page: &mut Document,
    container: NodeId,
    menu: &MenuDocument,
    layout: &PageLayout,
) -> Vec<RenderedItem> {
    let heading = page.query_selector(container, "h2");
    page.remove_children(container);
    let heading = match heading {
        Some(h2) => h2,
        None => {
            let h2 = page.create_element_with_class("h2", &layout.default_heading_class);
            page.set_text_content(h2, &layout.default_heading);
            h2
        }
    };
    page.append_child(container, heading);

    let mut rendered = Vec::with_capacity(menu.item_count());
    for (section_name, items) in &menu.sections {
        let section = render_section(page, section_name, items, &mut rendered);
        page.append_child(container, section);
    }
    rendered
}

fn render_section(
    page: &mut Document,
    name: &str,
    items: &[MenuItem],
    rendered: &mut Vec<RenderedItem>,
) -> NodeId {
    let section = page.create_element_with_class("div", "menu-section");
    let title = page.create_element("h3");
    page.set_text_content(title, name);
    page.append_child(section, title);

    let grid = page.create_element_with_class("div", "menu-grid");
    for item in items {
        let node = render_item(page, item);
        page.append_child(grid, node);
        rendered.push(RenderedItem {
            name: item.name.clone(),
            node,
        });
    }
    page.append_child(section, grid);
    section
}

fn render_item(page: &mut Document, item: &MenuItem) -> NodeId {
    let block = page.create_element_with_class("div", "menu-item");
    let content = page.create_element_with_class("div", "menu-item-content");
    let info = page.create_element_with_class("div", "menu-item-info");

    let title = page.create_element("h4");
    let title_text = page.create_element_with_class("span", "title-text");
    page.set_text_content(title_text, &item.name);
    page.append_child(title, title_text);
    page.append_child(info, title);

    if let Some(description) = item.description() {
        let p = page.create_element("p");
        page.set_text_content(p, description);
        page.append_child(info, p);
    }

    if let Some(options) = &item.options {
        let list = page.create_element_with_class("div", "menu-options");
        for (option, delta) in options {
            let line = page.create_element("small");
            page.set_text_content(line, &format_option(option, *delta));
            page.append_child(list, line);
        }
        page.append_child(info, list);
    }

    let price = page.create_element_with_class("span", "price");
    page.set_text_content(price, &format_price(item.price));

    page.append_child(content, info);
    page.append_child(content, price);
    page.append_child(block, content);
    block
}

pub fn format_price(price: f64) -> String {
    format!("${}", fixed2(price))
}

pub fn format_option(name: &str, delta: f64) -> String {
    format!("{name}: +${}", fixed2(delta))
}

/// Two decimal places, exact ties rounded away from zero.
///
/// `format!("{:.2}")` rounds exact ties to even, so 0.125 would become
/// "0.12". A binary float sits exactly halfway between two cents only when
/// its fraction is an odd number of eighths (.125, .375, .625, .875).
pub fn fixed2(value: f64) -> String {
    let eighths = value.abs() * 8.0;
    if value.is_finite() && eighths < 1e15 && eighths.fract() == 0.0 {
        let eighths = eighths as u64;
        if eighths % 2 == 1 {
            let cents = (eighths * 25 + 1) / 2;
            let sign = if value < 0.0 { "-" } else { "" };
            return format!("{sign}{}.{:02}", cents / 100, cents % 100);
        }
    }
    if value == 0.0 {
        // no "-0.00" for negative zero
        return "0.00".to_string();
    }
    format!("{value:.2}")
}

#[cfg(test)]
fn menu(raw: &str) -> MenuDocument {
    serde_json::from_str(raw).unwrap()
}

#[cfg(test)]
fn page_with_container(inner: &str) -> (Document, NodeId) {
    let doc = Document::parse(&format!(
        r#"<section id="menu"><div class="container">{inner}</div></section>"#
    ));
    let container = doc.query_selector(doc.root(), "#menu .container").unwrap();
    (doc, container)
}

#[test]
fn test_price_formatting() {
    assert_eq!(format_price(8.5), "$8.50");
    assert_eq!(format_price(0.0), "$0.00");
    assert_eq!(format_price(12.0), "$12.00");
    assert_eq!(format_price(0.125), "$0.13");
    assert_eq!(format_price(2.675), "$2.67"); // 2.67499999... in binary
    assert_eq!(format_price(1.005), "$1.00"); // 1.00499999...
    assert_eq!(format_price(10.375), "$10.38");
    assert_eq!(format_price(3.999), "$4.00");
    assert_eq!(fixed2(-0.125), "-0.13");
    assert_eq!(fixed2(-0.0), "0.00");
    assert_eq!(fixed2(-0.001), "-0.00");
}

#[test]
fn test_option_formatting() {
    assert_eq!(format_option("Add Bacon", 1.5), "Add Bacon: +$1.50");
    assert_eq!(format_option("Small", -1.0), "Small: +$-1.00");
}

#[test]
fn test_cheese_burger_scenario() {
    let (mut page, container) = page_with_container("<p>static menu</p>");
    let menu = menu(r#"{"sections": {"Burgers": [{"name": "Cheese Burger", "price": 8.5}]}}"#);

    let rendered = render_menu(&mut page, container, &menu, &PageLayout::default());
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].name, "Cheese Burger");

    let sections = page.query_selector_all(container, ".menu-section");
    assert_eq!(sections.len(), 1);
    let h3 = page.query_selector(sections[0], "h3").unwrap();
    assert_eq!(page.text_content(h3), "Burgers");

    let item = rendered[0].node;
    assert!(page.has_class(item, "menu-item"));
    let title = page.query_selector(item, "h4 .title-text").unwrap();
    assert_eq!(page.text_content(title), "Cheese Burger");
    let price = page.query_selector(item, ".price").unwrap();
    assert_eq!(page.text_content(price), "$8.50");
    assert!(page.query_selector(item, "p").is_none());
    assert!(page.query_selector(item, ".menu-options").is_none());
}

#[test]
fn test_item_block_markup() {
    let (mut page, container) = page_with_container("");
    let menu = menu(
        r#"{"sections": {"Sides": [
            {"name": "Fries", "price": 3.5, "description": "Crispy & hot",
             "options": {"Gravy": 1.25, "Cheese": 1}}
        ]}}"#,
    );
    let rendered = render_menu(&mut page, container, &menu, &PageLayout::default());

    assert_eq!(
        page.outer_html(rendered[0].node),
        concat!(
            r#"<div class="menu-item"><div class="menu-item-content"><div class="menu-item-info">"#,
            r#"<h4><span class="title-text">Fries</span></h4>"#,
            r#"<p>Crispy &amp; hot</p>"#,
            r#"<div class="menu-options"><small>Gravy: +$1.25</small><small>Cheese: +$1.00</small></div>"#,
            r#"</div><span class="price">$3.50</span></div></div>"#,
        )
    );
}

#[test]
fn test_sections_render_in_order() {
    let (mut page, container) = page_with_container("");
    let menu = menu(
        r#"{"sections": {
            "Breakfast": [{"name": "Eggs", "price": 5}, {"name": "Toast", "price": 2}],
            "Burgers": [],
            "Shakes": [{"name": "Vanilla Shake", "price": 4.75}]
        }}"#,
    );
    let rendered = render_menu(&mut page, container, &menu, &PageLayout::default());

    let titles: Vec<_> = page
        .query_selector_all(container, ".menu-section h3")
        .into_iter()
        .map(|h3| page.text_content(h3))
        .collect();
    assert_eq!(titles, ["Breakfast", "Burgers", "Shakes"]);

    let names: Vec<_> = rendered.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Eggs", "Toast", "Vanilla Shake"]);
}

#[test]
fn test_description_presence() {
    let (mut page, container) = page_with_container("");
    let menu = menu(
        r#"{"sections": {"Pie": [
            {"name": "Apple", "price": 3, "description": ""},
            {"name": "Cherry", "price": 3, "description": null},
            {"name": "Pecan", "price": 3, "description": "Warm slice"}
        ]}}"#,
    );
    let rendered = render_menu(&mut page, container, &menu, &PageLayout::default());

    let paragraphs: Vec<_> = rendered
        .iter()
        .map(|r| page.query_selector_all(r.node, "p"))
        .collect();
    assert!(paragraphs[0].is_empty());
    assert!(paragraphs[1].is_empty());
    assert_eq!(paragraphs[2].len(), 1);
    assert_eq!(page.text_content(paragraphs[2][0]), "Warm slice");
}

#[test]
fn test_empty_options_still_render_list() {
    let (mut page, container) = page_with_container("");
    let menu = menu(r#"{"sections": {"A": [{"name": "B", "price": 1, "options": {}}]}}"#);
    let rendered = render_menu(&mut page, container, &menu, &PageLayout::default());

    let options = page.query_selector(rendered[0].node, ".menu-options").unwrap();
    assert!(page.children(options).is_empty());
}

#[test]
fn test_heading_kept_or_synthesized() {
    let (mut page, container) =
        page_with_container(r#"<h2 class="retro">Today's Menu</h2><div class="menu-section">old</div>"#);
    let menu = menu(r#"{"sections": {}}"#);
    render_menu(&mut page, container, &menu, &PageLayout::default());
    assert_eq!(
        page.inner_html(container),
        r#"<h2 class="retro">Today's Menu</h2>"#
    );

    let (mut page, container) = page_with_container("<p>no heading here</p>");
    render_menu(&mut page, container, &menu, &PageLayout::default());
    assert_eq!(
        page.inner_html(container),
        r#"<h2 class="neon-text">Our Groovy Menu</h2>"#
    );
}

#[test]
fn test_layout_builder_defaults() {
    let layout = PageLayoutBuilder::default()
        .default_heading("Menu")
        .build()
        .unwrap();
    assert_eq!(layout.container, "#menu .container");
    assert_eq!(layout.default_heading, "Menu");
    assert_eq!(layout.default_heading_class, "neon-text");
}
