use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use derive_builder::Builder;
use tokio::task::JoinSet;

use crate::dom::{Document, NodeId};
use crate::render::RenderedItem;

pub const HAS_IMAGE: &str = "has-image";
pub const NO_IMAGE: &str = "no-image";

/// Turn an item name into the file name stem used for its photo.
///
/// "Bacon Deluxe!" -> "bacon-deluxe". Names that only differ in case or
/// punctuation share a photo.
pub fn image_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        let ch = if is_name_space(ch) { '-' } else { ch };
        if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-') {
            continue;
        }
        if ch == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(ch);
    }
    slug.trim_matches('-').to_string()
}

/// The whitespace set the site's script splits names on. Unlike
/// `char::is_whitespace` it excludes U+0085 and includes U+FEFF.
fn is_name_space(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n' | '\u{b}' | '\u{c}' | '\r' | ' ' | '\u{a0}' | '\u{1680}'
            | '\u{2000}'..='\u{200a}'
            | '\u{2028}' | '\u{2029}' | '\u{202f}' | '\u{205f}' | '\u{3000}' | '\u{feff}'
    )
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into), default)]
pub struct ImageLayout {
    pub dir: String,
    pub prefix: String,
    pub extension: String,
}

impl Default for ImageLayout {
    fn default() -> Self {
        Self {
            dir: "images".to_string(),
            prefix: "menu-".to_string(),
            extension: "jpg".to_string(),
        }
    }
}

impl ImageLayout {
    /// Site-relative path of the photo for `name`.
    pub fn path_for(&self, name: &str) -> String {
        format!(
            "{}/{}{}.{}",
            self.dir.trim_end_matches('/'),
            self.prefix,
            image_slug(name),
            self.extension
        )
    }
}

/// Checks whether a site-relative image path resolves to something.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn exists(&self, path: &str) -> bool;
}

/// Probes images on a live site with `HEAD` requests.
pub struct HttpImageProbe {
    client: reqwest::Client,
    base: reqwest::Url,
}

impl HttpImageProbe {
    pub fn new(base: reqwest::Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
        }
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn exists(&self, path: &str) -> bool {
        let Ok(url) = self.base.join(path) else {
            return false;
        };
        match self.client.head(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Probes images in a site directory on disk.
pub struct FsImageProbe {
    root: PathBuf,
}

impl FsImageProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ImageProbe for FsImageProbe {
    async fn exists(&self, path: &str) -> bool {
        match tokio::fs::metadata(self.root.join(path)).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found,
    Missing,
}

#[derive(Debug)]
struct Finished {
    node: NodeId,
    outcome: ProbeOutcome,
}

struct Waiting {
    name: String,
    path: String,
}

/// Photo probes still in flight for one render pass.
///
/// Outcomes are applied to the page by whoever owns it, one item at a time.
/// Dropping this abandons whatever has not finished yet.
pub struct PendingImages {
    tasks: JoinSet<Finished>,
    waiting: HashMap<NodeId, Waiting>,
}

/// Start one probe per rendered item. Nothing is awaited here.
pub fn spawn_probes(
    probe: Arc<dyn ImageProbe>,
    layout: &ImageLayout,
    items: &[RenderedItem],
) -> PendingImages {
    let mut tasks = JoinSet::new();
    let mut waiting = HashMap::with_capacity(items.len());
    for item in items {
        let path = layout.path_for(&item.name);
        let probe = Arc::clone(&probe);
        let node = item.node;
        let task_path = path.clone();
        tasks.spawn(async move {
            let outcome = if probe.exists(&task_path).await {
                ProbeOutcome::Found
            } else {
                ProbeOutcome::Missing
            };
            Finished { node, outcome }
        });
        waiting.insert(
            node,
            Waiting {
                name: item.name.clone(),
                path,
            },
        );
    }
    PendingImages { tasks, waiting }
}

impl PendingImages {
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Wait for the next probe to finish and apply it to its item. Returns
    /// `None` once every item has been marked.
    pub async fn next_applied(&mut self, page: &mut Document) -> Option<(NodeId, ProbeOutcome)> {
        while let Some(joined) = self.tasks.join_next().await {
            let Ok(finished) = joined else {
                // the item is marked missing once the set runs dry
                continue;
            };
            if let Some(waiting) = self.waiting.remove(&finished.node) {
                apply_outcome(page, finished.node, &waiting.name, &waiting.path, finished.outcome);
                return Some((finished.node, finished.outcome));
            }
        }

        // probes that died without reporting back count as missing photos
        let node = *self.waiting.keys().min()?;
        let waiting = self.waiting.remove(&node)?;
        apply_outcome(page, node, &waiting.name, &waiting.path, ProbeOutcome::Missing);
        Some((node, ProbeOutcome::Missing))
    }

    /// Apply every outcome, returning how many items got a photo.
    pub async fn settle(mut self, page: &mut Document) -> usize {
        let mut found = 0;
        while let Some((_, outcome)) = self.next_applied(page).await {
            if outcome == ProbeOutcome::Found {
                found += 1;
            }
        }
        found
    }
}

fn apply_outcome(page: &mut Document, item: NodeId, name: &str, path: &str, outcome: ProbeOutcome) {
    match outcome {
        ProbeOutcome::Found => {
            let img = page.create_element_with_class("img", "menu-item-photo");
            page.set_attr(img, "src", path);
            page.set_attr(img, "alt", name);
            if let Some(title) = page.query_selector(item, "h4") {
                page.append_child(title, img);
            }
            page.add_class(item, HAS_IMAGE);
        }
        ProbeOutcome::Missing => page.add_class(item, NO_IMAGE),
    }
}

#[cfg(test)]
struct FixedProbe {
    present: Vec<&'static str>,
}

#[cfg(test)]
#[async_trait]
impl ImageProbe for FixedProbe {
    async fn exists(&self, path: &str) -> bool {
        // photos take longer to answer than misses
        let found = self.present.iter().any(|p| *p == path);
        let delay = if found { 20 } else { 1 };
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        found
    }
}

#[cfg(test)]
struct PanickingProbe;

#[cfg(test)]
#[async_trait]
impl ImageProbe for PanickingProbe {
    async fn exists(&self, _path: &str) -> bool {
        panic!("probe blew up")
    }
}

#[cfg(test)]
fn rendered_page(names: &[&str]) -> (Document, Vec<RenderedItem>) {
    let items: Vec<serde_json::Value> = names
        .iter()
        .map(|n| serde_json::json!({"name": n, "price": 1}))
        .collect();
    let raw = serde_json::json!({ "sections": { "Mains": items } });
    let menu: crate::data::MenuDocument = serde_json::from_value(raw).unwrap();
    let mut page = Document::parse(r#"<div id="menu"><div class="container"></div></div>"#);
    let container = page.query_selector(page.root(), "#menu .container").unwrap();
    let items = crate::render::render_menu(&mut page, container, &menu, &Default::default());
    (page, items)
}

#[test]
fn test_image_slug() {
    assert_eq!(image_slug("Bacon Deluxe!"), "bacon-deluxe");
    assert_eq!(image_slug("  Double  -- Burger"), "double-burger");
    assert_eq!(image_slug("Cheese Burger"), "cheese-burger");
    assert_eq!(image_slug("Fish & Chips"), "fish-chips");
    assert_eq!(image_slug("7-Up Float"), "7-up-float");
    assert_eq!(image_slug("Cheese-Burger"), image_slug("cheese burger!"));
    assert_eq!(image_slug("Root\tBeer\n"), "root-beer");
    assert_eq!(image_slug("!!!"), "");
    assert_eq!(image_slug("Bacon Deluxe!"), image_slug("Bacon Deluxe!"));
}

#[test]
fn test_image_slug_whitespace_set() {
    assert_eq!(image_slug("Root\u{feff}Beer"), "root-beer");
    assert_eq!(image_slug("Egg\u{3000}Cream"), "egg-cream");
    assert_eq!(image_slug("Pot\u{a0}Roast"), "pot-roast");
    // NEL is not a separator, so it is stripped like punctuation
    assert_eq!(image_slug("Root\u{85}Beer"), "rootbeer");
}

#[test]
fn test_image_path() {
    let layout = ImageLayout::default();
    assert_eq!(layout.path_for("Cheese Burger"), "images/menu-cheese-burger.jpg");

    let layout = ImageLayoutBuilder::default()
        .dir("static/photos/")
        .prefix("")
        .extension("webp")
        .build()
        .unwrap();
    assert_eq!(layout.path_for("Root Beer Float"), "static/photos/root-beer-float.webp");

    // unset fields fall back to the defaults
    let layout = ImageLayoutBuilder::default().extension("png").build().unwrap();
    assert_eq!(layout.path_for("Chili Fries"), "images/menu-chili-fries.png");
}

#[tokio::test]
async fn test_every_item_gets_exactly_one_marker() {
    let (mut page, items) = rendered_page(&["Cheese Burger", "Onion Rings", "Cherry Pie"]);
    let probe = Arc::new(FixedProbe {
        present: vec!["images/menu-cheese-burger.jpg", "images/menu-cherry-pie.jpg"],
    });

    let pending = spawn_probes(probe, &ImageLayout::default(), &items);
    assert_eq!(pending.len(), 3);
    let found = pending.settle(&mut page).await;
    assert_eq!(found, 2);

    for item in &items {
        let has = page.has_class(item.node, HAS_IMAGE);
        let none = page.has_class(item.node, NO_IMAGE);
        assert!(has != none, "{} should carry exactly one marker", item.name);
    }

    let burger = items[0].node;
    let img = page.query_selector(burger, "h4 img.menu-item-photo").unwrap();
    assert_eq!(page.attr(img, "src"), Some("images/menu-cheese-burger.jpg"));
    assert_eq!(page.attr(img, "alt"), Some("Cheese Burger"));

    let rings = items[1].node;
    assert!(page.has_class(rings, NO_IMAGE));
    assert!(page.query_selector(rings, "img").is_none());
}

#[tokio::test]
async fn test_outcomes_apply_as_they_finish() {
    let (mut page, items) = rendered_page(&["Slow Photo", "Fast Miss"]);
    let probe = Arc::new(FixedProbe {
        present: vec!["images/menu-slow-photo.jpg"],
    });

    let mut pending = spawn_probes(probe, &ImageLayout::default(), &items);
    let first = pending.next_applied(&mut page).await.unwrap();
    assert_eq!(first, (items[1].node, ProbeOutcome::Missing));
    // the slower probe has not been applied yet
    assert!(!page.has_class(items[0].node, HAS_IMAGE));
    assert!(!page.has_class(items[0].node, NO_IMAGE));

    let second = pending.next_applied(&mut page).await.unwrap();
    assert_eq!(second, (items[0].node, ProbeOutcome::Found));
    assert!(pending.next_applied(&mut page).await.is_none());
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_dead_probe_counts_as_missing() {
    let (mut page, items) = rendered_page(&["Mystery Meat"]);
    let pending = spawn_probes(Arc::new(PanickingProbe), &ImageLayout::default(), &items);
    assert_eq!(pending.settle(&mut page).await, 0);
    assert!(page.has_class(items[0].node, NO_IMAGE));
    assert!(!page.has_class(items[0].node, HAS_IMAGE));
}

#[tokio::test]
async fn test_fs_probe() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("images")).unwrap();
    std::fs::write(dir.path().join("images/menu-fries.jpg"), b"jpeg").unwrap();

    let probe = FsImageProbe::new(dir.path());
    assert!(probe.exists("images/menu-fries.jpg").await);
    assert!(!probe.exists("images/menu-salad.jpg").await);
    assert!(!probe.exists("images").await);
}

#[actix_web::test]
async fn test_http_photo_lookup() {
    let site = tempfile::tempdir().unwrap();
    std::fs::create_dir(site.path().join("images")).unwrap();
    std::fs::write(site.path().join("images/menu-fries.jpg"), b"jpeg").unwrap();
    let addr = crate::site::spawn_site(site.path());

    // photos resolve next to the menu file
    let base = reqwest::Url::parse(&format!("http://{addr}/menu.json")).unwrap();
    let photos = HttpImageProbe::new(base);
    assert!(photos.exists("images/menu-fries.jpg").await);
    assert!(!photos.exists("images/menu-salad.jpg").await);

    let base = reqwest::Url::parse(&format!("http://{}/", crate::site::closed_addr())).unwrap();
    let offline = HttpImageProbe::new(base);
    assert!(!offline.exists("images/menu-fries.jpg").await);
}
