use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};

use crate::loader::{FileMenuSource, HttpMenuSource, MenuSource};
use crate::probe::{FsImageProbe, HttpImageProbe, ImageProbe};

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub port: u16,
    pub name: String,
    /// Stylesheet swapped in for `styles.css`; `None` serves the page as is.
    pub css: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MenuLocation {
    File(PathBuf),
    Url(reqwest::Url),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub site_dir: PathBuf,
    pub menu: MenuLocation,
    pub bind_addr: String,
    pub themes: Vec<Theme>,
    pub log_level: tracing::Level,
}

pub fn default_themes() -> Vec<Theme> {
    vec![
        Theme {
            port: 8000,
            name: "Original Retro Theme".to_string(),
            css: None,
        },
        Theme {
            port: 8001,
            name: "Checkerboard Classic".to_string(),
            css: Some("altstyles/checkerboard-classic.css".to_string()),
        },
        Theme {
            port: 8002,
            name: "Drive-In 50's Theme".to_string(),
            css: Some("altstyles/drive-in-50s.css".to_string()),
        },
    ]
}

impl Settings {
    /// Read settings from the process environment. Call `dotenvy::dotenv()`
    /// first to pick up a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let site_dir = PathBuf::from(lookup("DINER_SITE_DIR").unwrap_or_else(|| ".".to_string()));

        let menu = lookup("DINER_MENU_SOURCE").unwrap_or_else(|| "menu.json".to_string());
        let menu = if menu.starts_with("http://") || menu.starts_with("https://") {
            let url = reqwest::Url::parse(&menu)
                .with_context(|| format!("fail to parse DINER_MENU_SOURCE url {menu}"))?;
            MenuLocation::Url(url)
        } else {
            MenuLocation::File(site_dir.join(menu))
        };

        let themes = match lookup("DINER_THEMES") {
            Some(raw) => parse_themes(&raw)?,
            None => default_themes(),
        };

        let log_level = match lookup("DINER_LOG") {
            Some(level) => level
                .parse::<tracing::Level>()
                .with_context(|| format!("fail to parse DINER_LOG level {level}"))?,
            None => tracing::Level::INFO,
        };

        Ok(Self {
            site_dir,
            menu,
            bind_addr: lookup("DINER_BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            themes,
            log_level,
        })
    }

    pub fn menu_source(&self) -> Arc<dyn MenuSource> {
        match &self.menu {
            MenuLocation::File(path) => Arc::new(FileMenuSource::new(path)),
            MenuLocation::Url(url) => Arc::new(HttpMenuSource::new(url.clone())),
        }
    }

    /// Photos are looked up next to wherever the menu comes from.
    pub fn image_probe(&self) -> Arc<dyn ImageProbe> {
        match &self.menu {
            MenuLocation::File(_) => Arc::new(FsImageProbe::new(&self.site_dir)),
            MenuLocation::Url(url) => Arc::new(HttpImageProbe::new(url.clone())),
        }
    }
}

/// `port=name=css;port=name=css`. An empty css keeps the page's own
/// stylesheet.
pub fn parse_themes(raw: &str) -> anyhow::Result<Vec<Theme>> {
    let mut themes = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let mut fields = entry.splitn(3, '=');
        let (Some(port), Some(name)) = (fields.next(), fields.next()) else {
            bail!("theme entry `{entry}` should look like port=name=css");
        };
        let port = port
            .trim()
            .parse::<u16>()
            .with_context(|| format!("fail to parse port in theme entry `{entry}`"))?;
        let css = fields
            .next()
            .map(str::trim)
            .filter(|css| !css.is_empty())
            .map(str::to_string);
        themes.push(Theme {
            port,
            name: name.trim().to_string(),
            css,
        });
    }
    if themes.is_empty() {
        bail!("no theme configured");
    }
    Ok(themes)
}

#[cfg(test)]
fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

#[test]
fn test_defaults() {
    let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
    assert_eq!(settings.site_dir, PathBuf::from("."));
    assert_eq!(settings.menu, MenuLocation::File(PathBuf::from("./menu.json")));
    assert_eq!(settings.bind_addr, "127.0.0.1");
    assert_eq!(settings.themes, default_themes());
    assert_eq!(settings.log_level, tracing::Level::INFO);
}

#[test]
fn test_overrides() {
    let settings = Settings::from_lookup(lookup_from(&[
        ("DINER_SITE_DIR", "/srv/diner"),
        ("DINER_MENU_SOURCE", "https://eastsidediner.ca/menu.json"),
        ("DINER_THEMES", "9000=Plain=; 9001=Neon=alt/neon.css"),
        ("DINER_LOG", "debug"),
    ]))
    .unwrap();

    let MenuLocation::Url(url) = &settings.menu else {
        panic!("expected a url menu source");
    };
    assert_eq!(
        url.join("images/menu-fries.jpg").unwrap().as_str(),
        "https://eastsidediner.ca/images/menu-fries.jpg"
    );
    assert_eq!(settings.themes.len(), 2);
    assert_eq!(settings.themes[0].css, None);
    assert_eq!(settings.themes[1].css.as_deref(), Some("alt/neon.css"));
    assert_eq!(settings.log_level, tracing::Level::DEBUG);
}

#[test]
fn test_bad_values() {
    assert!(parse_themes("80a=Broken=x.css").is_err());
    assert!(parse_themes("8000").is_err());
    assert!(parse_themes(" ; ").is_err());
    assert!(Settings::from_lookup(lookup_from(&[("DINER_LOG", "loud")])).is_err());
    assert!(Settings::from_lookup(lookup_from(&[("DINER_MENU_SOURCE", "http://")])).is_err());
}
