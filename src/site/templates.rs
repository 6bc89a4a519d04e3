//! Purpose: Render page templates with Tera.
//! Exports: `TemplateEngine`, `TemplateSource`.
//! Role: Owns the template set; embedded by default, optionally loaded from disk.
//! Invariants: Template names are `<name>.html`; callers pass the bare `<name>`.
//! Invariants: Dev mode re-reads disk templates before each render.
//! Notes: HTML autoescaping stays on, so model strings are always escaped.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tera::{Context, Tera};

use super::page::PageModel;
use super::routes::{self, INTERNAL_ERROR, NOT_FOUND};
use crate::core::error::{Error, ErrorKind};

const EMBEDDED: [(&str, &str); 22] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("404.html", include_str!("../../templates/404.html")),
    ("500.html", include_str!("../../templates/500.html")),
    ("home.html", include_str!("../../templates/home.html")),
    (
        "documentation.html",
        include_str!("../../templates/documentation.html"),
    ),
    (
        "documentation-attributes.html",
        include_str!("../../templates/documentation-attributes.html"),
    ),
    (
        "documentation-builders.html",
        include_str!("../../templates/documentation-builders.html"),
    ),
    (
        "documentation-configuration.html",
        include_str!("../../templates/documentation-configuration.html"),
    ),
    (
        "documentation-differentIsm.html",
        include_str!("../../templates/documentation-differentIsm.html"),
    ),
    (
        "documentation-extensible.html",
        include_str!("../../templates/documentation-extensible.html"),
    ),
    (
        "documentation-multithreaded.html",
        include_str!("../../templates/documentation-multithreaded.html"),
    ),
    (
        "documentation-schematron.html",
        include_str!("../../templates/documentation-schematron.html"),
    ),
    (
        "documentation-version.html",
        include_str!("../../templates/documentation-version.html"),
    ),
    ("downloads.html", include_str!("../../templates/downloads.html")),
    ("license.html", include_str!("../../templates/license.html")),
    (
        "relationalTables.html",
        include_str!("../../templates/relationalTables.html"),
    ),
    (
        "releaseNotes-2.2.0.html",
        include_str!("../../templates/releaseNotes-2.2.0.html"),
    ),
    ("schematron.html", include_str!("../../templates/schematron.html")),
    (
        "tutorials-01.html",
        include_str!("../../templates/tutorials-01.html"),
    ),
    (
        "tutorials-02.html",
        include_str!("../../templates/tutorials-02.html"),
    ),
    (
        "tutorials-03.html",
        include_str!("../../templates/tutorials-03.html"),
    ),
    (
        "upgrade-2.0.0.html",
        include_str!("../../templates/upgrade-2.0.0.html"),
    ),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    Embedded,
    Dir { path: PathBuf, reload: bool },
}

#[derive(Debug)]
pub struct TemplateEngine {
    tera: RwLock<Tera>,
    source: TemplateSource,
}

impl TemplateEngine {
    pub fn embedded() -> Result<Self, Error> {
        let mut tera = Tera::default();
        tera.set_escape_fn(escape_html);
        tera.add_raw_templates(EMBEDDED.to_vec())
            .map_err(|err| template_error("failed to compile embedded templates", err))?;
        Ok(Self {
            tera: RwLock::new(tera),
            source: TemplateSource::Embedded,
        })
    }

    pub fn from_dir(dir: &Path, reload: bool) -> Result<Self, Error> {
        if !dir.is_dir() {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("templates directory does not exist")
                .with_path(dir)
                .with_hint("Pass --templates-dir pointing at the site's templates/ folder."));
        }
        let pattern = glob_pattern(dir)?;
        let mut tera = Tera::new(&pattern).map_err(|err| {
            template_error("failed to load templates", err).with_path(dir)
        })?;
        tera.set_escape_fn(escape_html);
        Ok(Self {
            tera: RwLock::new(tera),
            source: TemplateSource::Dir {
                path: dir.to_path_buf(),
                reload,
            },
        })
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    pub fn render(&self, name: &str, model: &PageModel) -> Result<String, Error> {
        if let TemplateSource::Dir { path, reload: true } = &self.source {
            let mut tera = self.tera.write().map_err(|_| poisoned())?;
            tera.full_reload()
                .map_err(|err| template_error("failed to reload templates", err).with_path(path))?;
        }
        let context = Context::from_serialize(model)
            .map_err(|err| template_error("failed to build template context", err))?;
        let tera = self.tera.read().map_err(|_| poisoned())?;
        tera.render(&format!("{name}.html"), &context)
            .map_err(|err| template_error(format!("failed to render template {name}"), err))
    }

    /// Renders every routed page plus both error pages against a probe model.
    pub fn check(&self, base_url: &str) -> Result<Vec<&'static str>, Error> {
        let mut rendered = Vec::new();
        let extra = [("/missing", NOT_FOUND), ("/index.jsp", INTERNAL_ERROR)];
        let targets = routes::pages()
            .iter()
            .map(|page| (page.path, *page))
            .chain(extra);
        for (path, page) in targets {
            let model = PageModel::build(base_url, path, page.title);
            let model = if page.template == INTERNAL_ERROR.template {
                model.with_panic("template check")
            } else {
                model
            };
            self.render(page.template, &model)?;
            rendered.push(page.template);
        }
        Ok(rendered)
    }
}

fn glob_pattern(dir: &Path) -> Result<String, Error> {
    let Some(dir) = dir.to_str() else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("templates directory must be valid UTF-8")
            .with_path(dir));
    };
    Ok(format!("{}/**/*.html", dir.trim_end_matches('/')))
}

/// Tera's HTML escaper with `/` left as-is, so URLs in attributes stay readable.
fn escape_html(input: &str) -> String {
    tera::escape_html(input).replace("&#x2F;", "/")
}

fn template_error(message: impl Into<String>, err: tera::Error) -> Error {
    Error::new(ErrorKind::Template)
        .with_message(message)
        .with_source(err)
}

fn poisoned() -> Error {
    Error::new(ErrorKind::Internal).with_message("template lock poisoned")
}
