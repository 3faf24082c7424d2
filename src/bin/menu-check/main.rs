use anyhow::{bail, Context};
use diner_menu::{config::Settings, dom::Document, MenuRendererBuilder};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::from_env()?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .with_ansi(true)
        .with_file(false)
        .pretty()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("fail to setup logging");

    let index = settings.site_dir.join("index.html");
    let markup = tokio::fs::read_to_string(&index)
        .await
        .with_context(|| format!("fail to read {}", index.display()))?;
    let mut page = Document::parse(&markup);

    let renderer = MenuRendererBuilder::default()
        .source(settings.menu_source())
        .probe(settings.image_probe())
        .build()?;

    let Some(rendered) = renderer.render(&mut page).await else {
        bail!("menu was not rendered, the page keeps its static content");
    };
    if rendered.contact_slots < 4 {
        warn!(
            patched = rendered.contact_slots,
            "some contact details on the page did not match and were left as is"
        );
    }

    let items = rendered.items;
    let photos = rendered.images.settle(&mut page).await;
    for item in page.query_selector_all(page.root(), ".menu-item.no-image .title-text") {
        info!(item = %page.text_content(item), "no photo");
    }
    info!(
        sections = rendered.sections,
        items,
        photos,
        missing = items - photos,
        "menu check finished"
    );
    Ok(())
}
