//! Purpose: Axum handlers for pages plus the status-page middleware for 404/500.
//! Exports: `SiteState`, `page_handler`, `root_redirect`, `not_found`, `status_pages`, `panic_response`.
//! Role: Glue between the route table, the page model, and the template engine.
//! Invariants: Handlers never render error pages themselves; they tag the response and
//! Invariants: `status_pages` renders exactly once on the way out.
//! Notes: Mirrors a status-pages plugin: any untagged 404 becomes the rendered 404 page.

use std::any::Any;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};

use super::page::PageModel;
use super::routes::{INTERNAL_ERROR, NOT_FOUND, Page, ROOT_REDIRECT};
use super::templates::TemplateEngine;
use crate::core::error::Error;

#[derive(Debug)]
pub struct SiteState {
    pub base_url: String,
    pub engine: TemplateEngine,
}

impl SiteState {
    pub fn new(base_url: impl Into<String>, engine: TemplateEngine) -> Self {
        Self {
            base_url: base_url.into(),
            engine,
        }
    }

    pub fn render(&self, page: &Page, path: &str) -> Result<String, Error> {
        let model = PageModel::build(&self.base_url, path, page.title);
        self.engine.render(page.template, &model)
    }
}

/// Marks a response that is already a finished page.
#[derive(Clone, Copy, Debug)]
struct RenderedPage;

/// Carried on a bare 500 so `status_pages` can describe what went wrong.
#[derive(Clone, Debug)]
enum Failure {
    Error(Arc<Error>),
    Panic(String),
}

pub async fn page_handler(state: Arc<SiteState>, page: &'static Page, uri: Uri) -> Response {
    match state.render(page, uri.path()) {
        Ok(html) => rendered(StatusCode::OK, html),
        Err(err) => failure_response(Failure::Error(Arc::new(err))),
    }
}

pub async fn root_redirect() -> Response {
    (
        StatusCode::FOUND,
        [(LOCATION, HeaderValue::from_static(ROOT_REDIRECT))],
    )
        .into_response()
}

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

pub async fn status_pages(
    State(state): State<Arc<SiteState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    if response.extensions().get::<RenderedPage>().is_some() {
        return response;
    }

    if let Some(failure) = response.extensions().get::<Failure>().cloned() {
        let model = PageModel::build(&state.base_url, &path, INTERNAL_ERROR.title);
        let model = match &failure {
            Failure::Error(err) => {
                tracing::error!(path = %path, error = %err.chain_text(), "page handler failed");
                model.with_failure(err)
            }
            Failure::Panic(message) => {
                tracing::error!(path = %path, panic = %message, "page handler panicked");
                model.with_panic(message)
            }
        };
        return error_page(&state, StatusCode::INTERNAL_SERVER_ERROR, &INTERNAL_ERROR, &model);
    }

    if response.status() == StatusCode::NOT_FOUND {
        tracing::debug!(path = %path, "not found");
        let model = PageModel::build(&state.base_url, &path, NOT_FOUND.title);
        return error_page(&state, StatusCode::NOT_FOUND, &NOT_FOUND, &model);
    }

    response
}

/// Handler for `CatchPanicLayer`; the payload is turned into a tagged 500.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else {
        "handler panicked".to_string()
    };
    failure_response(Failure::Panic(message))
}

fn failure_response(failure: Failure) -> Response {
    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(failure);
    response
}

fn rendered(status: StatusCode, html: String) -> Response {
    let mut response = (status, Html(html)).into_response();
    response.extensions_mut().insert(RenderedPage);
    response
}

fn error_page(state: &SiteState, status: StatusCode, page: &Page, model: &PageModel) -> Response {
    match state.engine.render(page.template, model) {
        Ok(html) => rendered(status, html),
        Err(err) => {
            tracing::error!(template = page.template, error = %err.chain_text(), "error page failed to render");
            let mut response = Response::new(Body::from(page.title));
            *response.status_mut() = status;
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            response
        }
    }
}
