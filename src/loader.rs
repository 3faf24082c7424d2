use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::data::MenuDocument;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("fail to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("fail to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("menu data is malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Somewhere the raw menu bytes can be fetched from.
#[async_trait]
pub trait MenuSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, LoadError>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

pub struct HttpMenuSource {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpMenuSource {
    pub fn new(url: reqwest::Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl MenuSource for HttpMenuSource {
    async fn fetch(&self) -> Result<Vec<u8>, LoadError> {
        let fetch_err = |source| LoadError::Fetch {
            url: self.url.to_string(),
            source,
        };
        let resp = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(fetch_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: self.url.to_string(),
                status,
            });
        }
        let body = resp.bytes().await.map_err(fetch_err)?;
        Ok(body.to_vec())
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}

pub struct FileMenuSource {
    path: PathBuf,
}

impl FileMenuSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MenuSource for FileMenuSource {
    async fn fetch(&self) -> Result<Vec<u8>, LoadError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| LoadError::Read {
                path: self.path.display().to_string(),
                source,
            })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Fetch and parse the menu. No retries; the caller decides what a failure
/// means for the page.
pub async fn load_menu(source: &dyn MenuSource) -> Result<MenuDocument, LoadError> {
    let bytes = source.fetch().await?;
    let menu = serde_json::from_slice(&bytes)?;
    Ok(menu)
}

#[cfg(test)]
pub(crate) struct StaticSource(pub Result<&'static str, &'static str>);

#[cfg(test)]
#[async_trait]
impl MenuSource for StaticSource {
    async fn fetch(&self) -> Result<Vec<u8>, LoadError> {
        match self.0 {
            Ok(body) => Ok(body.as_bytes().to_vec()),
            Err(reason) => Err(LoadError::Read {
                path: "menu.json".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, reason),
            }),
        }
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("menu.json");
    std::fs::write(
        &path,
        r#"{"phone": "(905) 555-0100", "sections": {"Burgers": [{"name": "Cheese Burger", "price": 8.5}]}}"#,
    )
    .unwrap();

    let menu = load_menu(&FileMenuSource::new(&path)).await.unwrap();
    assert_eq!(menu.phone.as_deref(), Some("(905) 555-0100"));
    assert_eq!(menu.sections["Burgers"][0].name, "Cheese Burger");
}

#[tokio::test]
async fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileMenuSource::new(dir.path().join("nope.json"));
    let err = load_menu(&source).await.unwrap_err();
    assert!(matches!(err, LoadError::Read { .. }));
    assert!(err.to_string().contains("nope.json"));
}

#[tokio::test]
async fn test_malformed_menu() {
    let err = load_menu(&StaticSource(Ok("{\"sections\": ")))
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Parse(_)));

    let err = load_menu(&StaticSource(Ok(r#"{"phone": "123"}"#)))
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::Parse(_)));
}

#[actix_web::test]
async fn test_load_over_http() {
    let site = tempfile::tempdir().unwrap();
    std::fs::write(
        site.path().join("menu.json"),
        r#"{"address": "1 Elm St, Town", "sections": {"Shakes": [{"name": "Chocolate", "price": 5}]}}"#,
    )
    .unwrap();
    let addr = crate::site::spawn_site(site.path());

    let url = reqwest::Url::parse(&format!("http://{addr}/menu.json")).unwrap();
    let menu = load_menu(&HttpMenuSource::new(url)).await.unwrap();
    assert_eq!(menu.address.as_deref(), Some("1 Elm St, Town"));
    assert_eq!(menu.sections["Shakes"][0].price, 5.0);

    let url = reqwest::Url::parse(&format!("http://{addr}/old-menu.json")).unwrap();
    let err = load_menu(&HttpMenuSource::new(url)).await.unwrap_err();
    assert!(
        matches!(err, LoadError::Status { status, .. } if status == reqwest::StatusCode::NOT_FOUND),
        "unexpected error: {err}"
    );
}

#[actix_web::test]
async fn test_unreachable_host() {
    let addr = crate::site::closed_addr();
    let url = reqwest::Url::parse(&format!("http://{addr}/menu.json")).unwrap();
    let err = load_menu(&HttpMenuSource::new(url)).await.unwrap_err();
    assert!(matches!(err, LoadError::Fetch { .. }), "unexpected error: {err}");
}
