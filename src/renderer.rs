use std::sync::Arc;

use derive_builder::Builder;
use tracing::{error, info};

use crate::contact::{patch_contact_info, ContactPatterns};
use crate::dom::Document;
use crate::loader::{load_menu, MenuSource};
use crate::probe::{spawn_probes, ImageLayout, ImageProbe, PendingImages};
use crate::render::{render_menu, PageLayout};

/// Loads the menu and puts it on the page.
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct MenuRenderer {
    source: Arc<dyn MenuSource>,
    probe: Arc<dyn ImageProbe>,
    #[builder(default)]
    page_layout: PageLayout,
    #[builder(default)]
    image_layout: ImageLayout,
    #[builder(default)]
    contact: ContactPatterns,
}

/// What one render pass did to the page.
pub struct RenderedMenu {
    pub sections: usize,
    pub items: usize,
    pub contact_slots: usize,
    pub images: PendingImages,
}

impl MenuRenderer {
    /// Fetch the menu, patch the contact details and rebuild the menu
    /// container. Photo probes keep running after this returns.
    ///
    /// Returns `None` when nothing was changed: the menu could not be
    /// loaded, or the page has no menu container. Errors never escape; the
    /// static page content simply stays.
    pub async fn render(&self, page: &mut Document) -> Option<RenderedMenu> {
        info!(source = %self.source.describe(), "loading menu");
        let menu = match load_menu(self.source.as_ref()).await {
            Ok(menu) => menu,
            Err(e) => {
                error!("fail to load menu: {e}");
                return None;
            }
        };

        let container = page.query_selector(page.root(), &self.page_layout.container)?;

        let contact_slots = patch_contact_info(page, &menu, &self.contact);
        let rendered = render_menu(page, container, &menu, &self.page_layout);
        let images = spawn_probes(Arc::clone(&self.probe), &self.image_layout, &rendered);

        info!(
            sections = menu.sections.len(),
            items = rendered.len(),
            "menu rendered"
        );
        Some(RenderedMenu {
            sections: menu.sections.len(),
            items: rendered.len(),
            contact_slots,
            images,
        })
    }
}

#[cfg(test)]
use crate::loader::{HttpMenuSource, StaticSource};

#[cfg(test)]
struct NoPhotos;

#[cfg(test)]
#[async_trait::async_trait]
impl ImageProbe for NoPhotos {
    async fn exists(&self, _path: &str) -> bool {
        false
    }
}

#[cfg(test)]
const PAGE: &str = r#"<header><h1>East Side Diner</h1></header>
<section id="menu"><div class="container"><h2 class="neon-text">Menu</h2><div class="menu-section"><h3>Static</h3></div></div></section>
<div class="contact-details"><p>136 East Main St, Welland, ON L3B 3W5</p><p>(905) 735-4471</p></div>"#;

#[cfg(test)]
fn renderer(source: impl MenuSource + 'static) -> MenuRenderer {
    MenuRendererBuilder::default()
        .source(Arc::new(source))
        .probe(Arc::new(NoPhotos))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_render_pass() {
    let mut page = Document::parse(PAGE);
    let renderer = renderer(StaticSource(Ok(r#"{
        "phone": "(905) 555-0100",
        "sections": {
            "Burgers": [{"name": "Cheese Burger", "price": 8.5}],
            "Shakes": [{"name": "Chocolate", "price": 5}, {"name": "Strawberry", "price": 5}]
        }
    }"#)));

    let rendered = renderer.render(&mut page).await.unwrap();
    assert_eq!(rendered.sections, 2);
    assert_eq!(rendered.items, 3);
    assert_eq!(rendered.contact_slots, 1);
    assert_eq!(rendered.images.len(), 3);

    let root = page.root();
    let titles: Vec<_> = page
        .query_selector_all(root, "#menu .menu-section h3")
        .into_iter()
        .map(|h3| page.text_content(h3))
        .collect();
    assert_eq!(titles, ["Burgers", "Shakes"]);

    // text content is in place before any probe has been applied
    let items = page.query_selector_all(root, ".menu-item");
    assert!(items
        .iter()
        .all(|i| !page.has_class(*i, "has-image") && !page.has_class(*i, "no-image")));

    assert_eq!(rendered.images.settle(&mut page).await, 0);
    assert!(items.iter().all(|i| page.has_class(*i, "no-image")));
}

#[tokio::test]
async fn test_fetch_failure_leaves_page_untouched() {
    let mut page = Document::parse(PAGE);
    let before = page.to_html();
    let renderer = renderer(StaticSource(Err("network down")));

    assert!(renderer.render(&mut page).await.is_none());
    assert_eq!(page.to_html(), before);
}

#[actix_web::test]
async fn test_missing_remote_menu_leaves_page_untouched() {
    let site = tempfile::tempdir().unwrap();
    let addr = crate::site::spawn_site(site.path());
    let url = reqwest::Url::parse(&format!("http://{addr}/menu.json")).unwrap();

    let mut page = Document::parse(PAGE);
    let before = page.to_html();
    let renderer = renderer(HttpMenuSource::new(url));

    assert!(renderer.render(&mut page).await.is_none());
    assert_eq!(page.to_html(), before);
}

#[tokio::test]
async fn test_malformed_menu_leaves_page_untouched() {
    let mut page = Document::parse(PAGE);
    let before = page.to_html();
    let renderer = renderer(StaticSource(Ok(
        r#"{"phone": "1", "sections": {"A": [{"name": "B"}]}}"#,
    )));

    assert!(renderer.render(&mut page).await.is_none());
    assert_eq!(page.to_html(), before);
}

#[tokio::test]
async fn test_missing_container_is_a_no_op() {
    let mut page = Document::parse(
        r#"<div class="contact-details"><p>136 East Main St, Welland, ON L3B 3W5</p></div>"#,
    );
    let before = page.to_html();
    let renderer = renderer(StaticSource(Ok(
        r#"{"address": "1 Elm St, Town", "sections": {"A": []}}"#,
    )));

    assert!(renderer.render(&mut page).await.is_none());
    assert_eq!(page.to_html(), before);
}
