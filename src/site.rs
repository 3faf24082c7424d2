//! Static file serving for the demo server. Every theme gets its own port;
//! the only difference between them is the stylesheet `index.html` links.

use std::path::{Component, Path, PathBuf};

use actix_cors::Cors;
use actix_web::{http::Method, web, App, HttpRequest, HttpResponse, HttpServer};
use tracing::{error, info};

use crate::config::Theme;

const DEFAULT_STYLESHEET: &str = r#"<link rel="stylesheet" href="styles.css">"#;

pub struct SiteState {
    pub root: PathBuf,
    pub theme: Theme,
}

/// Point the page at the theme's stylesheet instead of `styles.css`.
pub fn themed_index(index: &str, css: Option<&str>) -> String {
    match css {
        Some(css) => index.replace(
            DEFAULT_STYLESHEET,
            &format!(r#"<link rel="stylesheet" href="{css}">"#),
        ),
        None => index.to_string(),
    }
}

/// Map a request path onto a file below `root`. The path is percent-decoded
/// first, then anything trying to climb out of the site is refused.
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let relative = Path::new(decoded.trim_start_matches('/'));
    let mut resolved = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

async fn index(state: web::Data<SiteState>) -> HttpResponse {
    let path = state.root.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(themed_index(&content, state.theme.css.as_deref())),
        Err(e) => {
            error!("fail to read {}: {e}", path.display());
            HttpResponse::NotFound().finish()
        }
    }
}

async fn static_file(req: HttpRequest, state: web::Data<SiteState>) -> HttpResponse {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return HttpResponse::MethodNotAllowed().finish();
    }
    let Some(path) = resolve_path(&state.root, req.path()) else {
        return HttpResponse::Forbidden().finish();
    };
    match tokio::fs::read(&path).await {
        Ok(body) => HttpResponse::Ok()
            .content_type(content_type(&path))
            .body(body),
        Err(_) => HttpResponse::NotFound().finish(),
    }
}

pub fn routes(state: web::Data<SiteState>) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(state)
            .service(web::resource(["/", "/index.html"]).route(web::get().to(index)))
            .default_service(web::to(static_file));
    }
}

/// Serve `root` with `theme` until the server is stopped. A port that can't
/// be bound is logged and skipped so the other themes keep running.
pub async fn serve_theme(bind_addr: String, root: PathBuf, theme: Theme) -> bool {
    let port = theme.port;
    let name = theme.name.clone();
    let state = web::Data::new(SiteState { root, theme });

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Cors::default().allow_any_origin().allow_any_method())
            .configure(routes(state.clone()))
    })
    .bind((bind_addr.as_str(), port));

    let server = match server {
        Ok(server) => server,
        Err(e) => {
            error!("could not start {name} server on port {port}: {e}");
            return false;
        }
    };

    info!("{name} server running at http://{bind_addr}:{port}");
    if let Err(e) = server.run().await {
        error!("{name} server stopped: {e}");
        return false;
    }
    true
}

#[test]
fn test_themed_index() {
    let index = r#"<head><link rel="stylesheet" href="styles.css"></head>"#;
    assert_eq!(
        themed_index(index, Some("altstyles/drive-in-50s.css")),
        r#"<head><link rel="stylesheet" href="altstyles/drive-in-50s.css"></head>"#
    );
    assert_eq!(themed_index(index, None), index);

    let other = r#"<link href="styles.css" rel="stylesheet">"#;
    assert_eq!(themed_index(other, Some("x.css")), other);
}

#[test]
fn test_resolve_path() {
    let root = Path::new("/srv/diner");
    assert_eq!(
        resolve_path(root, "/images/menu-fries.jpg"),
        Some(PathBuf::from("/srv/diner/images/menu-fries.jpg"))
    );
    assert_eq!(
        resolve_path(root, "/./menu.json"),
        Some(PathBuf::from("/srv/diner/menu.json"))
    );
    assert_eq!(resolve_path(root, "/../etc/passwd"), None);
    assert_eq!(resolve_path(root, "/images/../../secret"), None);
}

#[test]
fn test_resolve_encoded_path() {
    let root = Path::new("/srv/diner");
    assert_eq!(
        resolve_path(root, "/images/menu%20x.jpg"),
        Some(PathBuf::from("/srv/diner/images/menu x.jpg"))
    );
    assert_eq!(resolve_path(root, "/images/%2e%2e/%2E%2E/secret"), None);
    assert_eq!(resolve_path(root, "/%2e%2e%2fetc/passwd"), None);
    // not valid utf-8 once decoded
    assert_eq!(resolve_path(root, "/images/%ff.jpg"), None);
}

#[cfg(test)]
fn test_site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        r#"<html><head><link rel="stylesheet" href="styles.css"></head></html>"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("menu.json"), r#"{"sections": {}}"#).unwrap();
    dir
}

#[cfg(test)]
fn state(root: &Path, css: Option<&str>) -> web::Data<SiteState> {
    web::Data::new(SiteState {
        root: root.to_path_buf(),
        theme: Theme {
            port: 0,
            name: "test".to_string(),
            css: css.map(str::to_string),
        },
    })
}

/// Serve `root` on a free local port for the rest of the test.
#[cfg(test)]
pub(crate) fn spawn_site(root: &Path) -> std::net::SocketAddr {
    let state = state(root, None);
    let server = HttpServer::new(move || App::new().configure(routes(state.clone())))
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    addr
}

/// A local address nothing is listening on.
#[cfg(test)]
pub(crate) fn closed_addr() -> std::net::SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[actix_web::test]
async fn test_serves_themed_index() {
    use actix_web::test;

    let site = test_site();
    let app = test::init_service(
        App::new().configure(routes(state(site.path(), Some("altstyles/checkerboard-classic.css")))),
    )
    .await;

    for uri in ["/", "/index.html"] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        let body = std::str::from_utf8(&body).unwrap();
        assert!(body.contains(r#"href="altstyles/checkerboard-classic.css""#));
        assert!(!body.contains(r#"href="styles.css""#));
    }
}

#[actix_web::test]
async fn test_serves_static_files() {
    use actix_web::test;

    let site = test_site();
    let app = test::init_service(App::new().configure(routes(state(site.path(), None)))).await;

    let resp = test::call_service(&app, test::TestRequest::get().uri("/menu.json").to_request()).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/images/menu-nothing.jpg").to_request(),
    )
    .await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

    let resp = test::call_service(&app, test::TestRequest::post().uri("/menu.json").to_request()).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::METHOD_NOT_ALLOWED);
}

#[actix_web::test]
async fn test_serves_encoded_file_names() {
    use actix_web::test;

    let site = test_site();
    std::fs::create_dir(site.path().join("images")).unwrap();
    std::fs::write(site.path().join("images/menu x.jpg"), b"jpeg").unwrap();
    let app = test::init_service(App::new().configure(routes(state(site.path(), None)))).await;

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/images/menu%20x.jpg").to_request(),
    )
    .await;
    assert!(resp.status().is_success());
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/jpeg");
    assert_eq!(&test::read_body(resp).await[..], b"jpeg");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/images/%2e%2e/index.html").to_request(),
    )
    .await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
}
