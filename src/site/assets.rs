//! Purpose: Mount the static asset directories under their URL prefixes.
//! Exports: `Mount`, `MountKind`, `MountStatus`, `MOUNTS`, `mount_assets`, `mount_status`.
//! Role: Static half of the router; file IO is delegated to tower-http.
//! Invariants: Requests cannot escape a mount's directory (ServeDir rejects `..`).
//! Invariants: Missing files surface as bare 404s for the status-page layer to render.
//! Invariants: Directory redirects stay under the mount prefix; only `/docs` serves index pages.

use std::path::{Path, PathBuf};

use axum::Router;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::http::header::LOCATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use tower_http::services::{ServeDir, ServeFile};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    File,
    Dir,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub prefix: &'static str,
    pub relative: &'static str,
    pub kind: MountKind,
    /// Serve `index.html` for directory requests (generated API docs).
    pub index: bool,
}

pub const MOUNTS: [Mount; 6] = [
    Mount {
        prefix: "/robots.txt",
        relative: "robots.txt",
        kind: MountKind::File,
        index: false,
    },
    Mount {
        prefix: "/css",
        relative: "css",
        kind: MountKind::Dir,
        index: false,
    },
    Mount {
        prefix: "/docs",
        relative: "docs",
        kind: MountKind::Dir,
        index: true,
    },
    Mount {
        prefix: "/files",
        relative: "files",
        kind: MountKind::Dir,
        index: false,
    },
    Mount {
        prefix: "/images",
        relative: "images",
        kind: MountKind::Dir,
        index: false,
    },
    Mount {
        prefix: "/js",
        relative: "js",
        kind: MountKind::Dir,
        index: false,
    },
];

impl Mount {
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(self.relative)
    }

    pub fn is_present(&self, root: &Path) -> bool {
        let path = self.resolve(root);
        match self.kind {
            MountKind::File => path.is_file(),
            MountKind::Dir => path.is_dir(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MountStatus {
    #[serde(flatten)]
    pub mount: Mount,
    pub path: String,
    pub present: bool,
}

pub fn mount_assets<S>(router: Router<S>, root: &Path) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    MOUNTS.iter().fold(router, |router, mount| {
        let path = mount.resolve(root);
        match mount.kind {
            MountKind::File => router.route_service(mount.prefix, ServeFile::new(path)),
            MountKind::Dir => {
                let dir = ServeDir::new(path).append_index_html_on_directories(mount.index);
                router.merge(
                    Router::<S>::new()
                        .nest_service(mount.prefix, dir)
                        .layer(middleware::from_fn_with_state(*mount, keep_under_prefix)),
                )
            }
        }
    })
}

/// ServeDir sees the path with the prefix stripped, so its trailing-slash
/// redirects point outside the mount until the prefix is put back.
async fn keep_under_prefix(State(mount): State<Mount>, request: Request, next: Next) -> Response {
    if mount.index && request.uri().path() == mount.prefix {
        let location = match request.uri().query() {
            Some(query) => format!("{}/?{query}", mount.prefix),
            None => format!("{}/", mount.prefix),
        };
        return Redirect::temporary(&location).into_response();
    }

    let mut response = next.run(request).await;
    if response.status().is_redirection() {
        let prefixed = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|location| location.starts_with('/'))
            .and_then(|location| {
                HeaderValue::from_str(&format!("{}{location}", mount.prefix)).ok()
            });
        if let Some(location) = prefixed {
            response.headers_mut().insert(LOCATION, location);
        }
    }
    response
}

pub fn mount_status(root: &Path) -> Vec<MountStatus> {
    MOUNTS
        .iter()
        .map(|mount| MountStatus {
            mount: *mount,
            path: mount.resolve(root).display().to_string(),
            present: mount.is_present(root),
        })
        .collect()
}
