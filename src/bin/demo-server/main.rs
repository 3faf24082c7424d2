use anyhow::bail;
use diner_menu::{config::Settings, site};
use tracing::info;

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

    info!(site = %settings.site_dir.display(), "starting demo servers");

    let servers = settings.themes.iter().cloned().map(|theme| {
        site::serve_theme(
            settings.bind_addr.clone(),
            settings.site_dir.clone(),
            theme,
        )
    });
    let results = futures::future::join_all(servers).await;

    if results.iter().all(|started| !started) {
        bail!("none of the demo servers could be started");
    }
    info!("demo complete");
    Ok(())
}
