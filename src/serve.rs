//! Purpose: Run the documentation site over HTTP.
//! Exports: `serve`, `router`, `build_state`, `check`, `CheckReport`.
//! Role: Axum server wiring the route table, static mounts, and status pages together.
//! Invariants: Every page route answers GET/HEAD; `/` redirects to the home page.
//! Invariants: Layers run trace -> status pages -> panic catcher -> handlers.
//! Notes: Shutdown is graceful on SIGINT/SIGTERM with a bounded wait.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, Uri};
use axum::routing::get;
use axum::{Router, middleware};
use serde::Serialize;
use tokio::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::core::config::SiteConfig;
use crate::core::error::{Error, ErrorKind};
use crate::site::assets::{self, MountStatus};
use crate::site::forwarded::Origin;
use crate::site::handlers::{
    SiteState, not_found, page_handler, panic_response, root_redirect, status_pages,
};
use crate::site::routes;
use crate::site::templates::{TemplateEngine, TemplateSource};

pub async fn serve(config: SiteConfig) -> Result<(), Error> {
    init_tracing();

    let state = build_state(&config)?;
    for status in assets::mount_status(&config.static_dir) {
        if !status.present {
            tracing::warn!(prefix = status.mount.prefix, path = %status.path, "static mount is missing");
        }
    }
    let app = router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to bind {}", config.bind))
                .with_source(err)
        })?;
    tracing::info!(
        bind = %config.bind,
        base_url = %config.base_url,
        dev = config.dev,
        "serving documentation site"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    })
    .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

pub fn build_state(config: &SiteConfig) -> Result<Arc<SiteState>, Error> {
    let engine = match &config.templates_dir {
        Some(dir) => TemplateEngine::from_dir(dir, config.dev)?,
        None => TemplateEngine::embedded()?,
    };
    Ok(Arc::new(SiteState::new(config.base_url.clone(), engine)))
}

pub fn router(state: Arc<SiteState>, static_dir: &Path) -> Router {
    let mut pages = Router::new().route("/", get(root_redirect));
    for page in routes::pages() {
        pages = pages.route(
            page.path,
            get(move |State(state): State<Arc<SiteState>>, uri: Uri| {
                page_handler(state, page, uri)
            }),
        );
    }
    let app = assets::mount_assets(pages, static_dir).fallback(not_found);
    with_site_layers(app, state)
}

fn with_site_layers(app: Router<Arc<SiteState>>, state: Arc<SiteState>) -> Router {
    app.layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), status_pages))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let origin = Origin::resolve(request.headers(), peer);
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        client = %origin.client_display(),
        scheme = %origin.scheme,
        host = origin.host.as_deref().unwrap_or("-"),
    )
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub bind: String,
    pub base_url: String,
    pub templates: String,
    pub dev: bool,
    pub rendered: Vec<&'static str>,
    pub static_dir: String,
    pub mounts: Vec<MountStatus>,
}

/// Validates everything `serve` would need without binding a socket.
pub fn check(config: &SiteConfig) -> Result<CheckReport, Error> {
    let state = build_state(config)?;
    let rendered = state.engine.check(&config.base_url)?;
    let templates = match state.engine.source() {
        TemplateSource::Embedded => "embedded".to_string(),
        TemplateSource::Dir { path, .. } => path.display().to_string(),
    };
    Ok(CheckReport {
        bind: config.bind.to_string(),
        base_url: config.base_url.clone(),
        templates,
        dev: config.dev,
        rendered,
        static_dir: config.static_dir.display().to_string(),
        mounts: assets::mount_status(&config.static_dir),
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

#[cfg(test)]
mod tests {
    use super::{SiteState, build_state, check, router, with_site_layers};
    use crate::core::config::{ConfigOverrides, SiteConfig};
    use crate::core::error::ErrorKind;
    use crate::site::templates::TemplateEngine;
    use axum::Router;
    use axum::routing::get;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::sync::Arc;

    const BASE: &str = "https://ddmsence.urizone.net";

    struct Fetched {
        status: u16,
        content_type: String,
        location: Option<String>,
        body: String,
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });
        format!("http://{addr}")
    }

    async fn fetch(method: &'static str, url: String) -> Fetched {
        tokio::task::spawn_blocking(move || {
            let agent = ureq::AgentBuilder::new().redirects(0).build();
            let response = match agent.request(method, &url).call() {
                Ok(response) => response,
                Err(ureq::Error::Status(_, response)) => response,
                Err(err) => panic!("request failed: {err}"),
            };
            Fetched {
                status: response.status(),
                content_type: response.header("content-type").unwrap_or_default().to_string(),
                location: response.header("location").map(str::to_string),
                body: response.into_string().unwrap_or_default(),
            }
        })
        .await
        .expect("join")
    }

    fn static_root(dir: &Path) {
        std::fs::create_dir_all(dir.join("css")).expect("css");
        std::fs::write(dir.join("css").join("site.css"), "body { margin: 0; }\n").expect("css");
        std::fs::write(dir.join("robots.txt"), "User-agent: *\nDisallow:\n").expect("robots");
    }

    async fn boom() -> &'static str {
        panic!("kaboom")
    }

    fn embedded_state() -> Arc<SiteState> {
        Arc::new(SiteState::new(BASE, TemplateEngine::embedded().expect("engine")))
    }

    #[tokio::test]
    async fn pages_render_with_titles() {
        let temp = tempfile::tempdir().expect("tempdir");
        let base = spawn(router(embedded_state(), temp.path())).await;

        let response = fetch("GET", format!("{base}/tutorials-03.jsp")).await;
        assert_eq!(response.status, 200);
        assert!(response.content_type.starts_with("text/html"));
        assert!(response.body.contains("<title>Tutorial #3 (Escape) - DDMSence</title>"));
        assert!(response.body.contains("https://ddmsence.urizone.net/tutorials-03.jsp"));
    }

    #[tokio::test]
    async fn root_redirects_to_home() {
        let temp = tempfile::tempdir().expect("tempdir");
        let base = spawn(router(embedded_state(), temp.path())).await;

        let response = fetch("GET", format!("{base}/")).await;
        assert_eq!(response.status, 302);
        assert_eq!(response.location.as_deref(), Some("/index.jsp"));
    }

    #[tokio::test]
    async fn unknown_paths_render_not_found_page() {
        let temp = tempfile::tempdir().expect("tempdir");
        let base = spawn(router(embedded_state(), temp.path())).await;

        let response = fetch("GET", format!("{base}/no-such-page.jsp")).await;
        assert_eq!(response.status, 404);
        assert!(response.content_type.starts_with("text/html"));
        assert!(response.body.contains("404 Not Found"));
        assert!(response.body.contains("/no-such-page.jsp"));
    }

    #[tokio::test]
    async fn static_assets_are_served_and_misses_render_404() {
        let temp = tempfile::tempdir().expect("tempdir");
        static_root(temp.path());
        let base = spawn(router(embedded_state(), temp.path())).await;

        let css = fetch("GET", format!("{base}/css/site.css")).await;
        assert_eq!(css.status, 200);
        assert!(css.content_type.starts_with("text/css"));
        assert_eq!(css.body, "body { margin: 0; }\n");

        let robots = fetch("GET", format!("{base}/robots.txt")).await;
        assert_eq!(robots.status, 200);
        assert!(robots.body.starts_with("User-agent"));

        let missing = fetch("GET", format!("{base}/images/missing.png")).await;
        assert_eq!(missing.status, 404);
        assert!(missing.body.contains("404 Not Found"));

        let escape = fetch("GET", format!("{base}/css/..%2f..%2fetc%2fpasswd")).await;
        assert_eq!(escape.status, 404);
    }

    #[tokio::test]
    async fn docs_directories_redirect_within_the_mount() {
        let temp = tempfile::tempdir().expect("tempdir");
        let api = temp.path().join("docs").join("api");
        std::fs::create_dir_all(&api).expect("docs");
        std::fs::write(temp.path().join("docs").join("index.html"), "docs home").expect("index");
        std::fs::write(api.join("index.html"), "api home").expect("api");
        std::fs::create_dir(temp.path().join("css")).expect("css");
        let base = spawn(router(embedded_state(), temp.path())).await;

        let root = fetch("GET", format!("{base}/docs")).await;
        assert_eq!(root.status, 307);
        assert_eq!(root.location.as_deref(), Some("/docs/"));
        assert_eq!(fetch("GET", format!("{base}/docs/")).await.body, "docs home");

        let sub = fetch("GET", format!("{base}/docs/api?lang=en")).await;
        assert_eq!(sub.status, 307);
        assert_eq!(sub.location.as_deref(), Some("/docs/api/?lang=en"));
        assert_eq!(fetch("GET", format!("{base}/docs/api/")).await.body, "api home");

        // Other mounts never serve directory indexes.
        let css = fetch("GET", format!("{base}/css/")).await;
        assert_eq!(css.status, 404);
        assert!(css.body.contains("404 Not Found"));
    }

    #[tokio::test]
    async fn non_get_methods_are_rejected_on_pages() {
        let temp = tempfile::tempdir().expect("tempdir");
        let base = spawn(router(embedded_state(), temp.path())).await;

        let response = fetch("POST", format!("{base}/license.jsp")).await;
        assert_eq!(response.status, 405);

        let head = fetch("HEAD", format!("{base}/license.jsp")).await;
        assert_eq!(head.status, 200);
        assert!(head.body.is_empty());
    }

    #[tokio::test]
    async fn template_failures_render_error_page() {
        let temp = tempfile::tempdir().expect("tempdir");
        let views = temp.path().join("views");
        std::fs::create_dir(&views).expect("views");
        std::fs::write(views.join("home.html"), "{{ undefined_value }}").expect("home");
        std::fs::write(views.join("404.html"), "missing {{ path }}").expect("404");
        std::fs::write(
            views.join("500.html"),
            "failed: {{ message }}\n{{ stack_trace }}",
        )
        .expect("500");
        let state = Arc::new(SiteState::new(
            BASE,
            TemplateEngine::from_dir(&views, false).expect("engine"),
        ));
        let base = spawn(router(state, temp.path())).await;

        let response = fetch("GET", format!("{base}/index.jsp")).await;
        assert_eq!(response.status, 500);
        assert!(response.body.starts_with("failed: failed to render template home"));
        assert!(response.body.contains("caused by:"));

        let response = fetch("GET", format!("{base}/nowhere")).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body, "missing /nowhere");
    }

    #[tokio::test]
    async fn broken_error_template_falls_back_to_plain_text() {
        let temp = tempfile::tempdir().expect("tempdir");
        let views = temp.path().join("views");
        std::fs::create_dir(&views).expect("views");
        std::fs::write(views.join("home.html"), "home").expect("home");
        let state = Arc::new(SiteState::new(
            BASE,
            TemplateEngine::from_dir(&views, false).expect("engine"),
        ));
        let base = spawn(router(state, temp.path())).await;

        let response = fetch("GET", format!("{base}/nowhere")).await;
        assert_eq!(response.status, 404);
        assert!(response.content_type.starts_with("text/plain"));
        assert_eq!(response.body, "404 Not Found");
    }

    #[tokio::test]
    async fn panics_render_error_page() {
        let state = embedded_state();
        let app = Router::new().route("/boom", get(boom));
        let base = spawn(with_site_layers(app, state)).await;

        let response = fetch("GET", format!("{base}/boom")).await;
        assert_eq!(response.status, 500);
        assert!(response.body.contains("500 Internal Server Error"));
        assert!(response.body.contains("kaboom"));
    }

    #[test]
    fn check_reports_templates_and_mounts() {
        let temp = tempfile::tempdir().expect("tempdir");
        static_root(temp.path());
        let overrides = ConfigOverrides {
            base_url: Some(BASE.to_string()),
            static_dir: Some(temp.path().to_path_buf()),
            ..ConfigOverrides::default()
        };
        let config = SiteConfig::resolve(overrides, None).expect("config");
        let report = check(&config).expect("check");
        assert_eq!(report.templates, "embedded");
        assert_eq!(report.rendered.len(), 21);
        let present = report.mounts.iter().filter(|mount| mount.present).count();
        assert_eq!(present, 2);
    }

    #[test]
    fn missing_templates_dir_fails_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let overrides = ConfigOverrides {
            templates_dir: Some(temp.path().join("absent")),
            ..ConfigOverrides::default()
        };
        let config = SiteConfig::resolve(overrides, None).expect("config");
        let err = build_state(&config).expect_err("missing templates");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
