//! Purpose: Resolve the site server configuration from flags, environment, and a TOML file.
//! Exports: `SiteConfig`, `ConfigFile`, `ConfigOverrides`, `normalize_base_url`.
//! Role: Single place where defaults and precedence are decided.
//! Invariants: Precedence is flag/env (clap) > file > default.
//! Invariants: `base_url` never ends with `/` so templates can append the request path.
//! Invariants: Relative paths in a config file resolve against the file's directory.
//! Invariants: Bad values read from the file are `Config` errors carrying the file path.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use super::error::{Error, ErrorKind};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_TEMPLATES_DIR: &str = "templates";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiteConfig {
    pub bind: SocketAddr,
    pub base_url: String,
    pub static_dir: PathBuf,
    /// `None` serves the templates compiled into the binary.
    pub templates_dir: Option<PathBuf>,
    pub dev: bool,
}

/// Values supplied on the command line (clap already folds in `DDMSENCE_*` env vars).
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bind: Option<String>,
    pub base_url: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub templates_dir: Option<PathBuf>,
    pub dev: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub bind: Option<String>,
    pub base_url: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub templates_dir: Option<PathBuf>,
    pub dev: Option<bool>,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read config file")
                .with_path(path)
                .with_source(err)
        })?;
        let mut file = Self::parse(&text).map_err(|err| err.with_path(path))?;
        file.source = Some(path.to_path_buf());
        Ok(file)
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Config)
                .with_message(format!("invalid config file: {}", err.message()))
                .with_hint("Supported keys: bind, base_url, static_dir, templates_dir, dev.")
        })
    }

    fn resolve_path(&self, path: PathBuf) -> PathBuf {
        match self.source.as_deref().and_then(Path::parent) {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }

    /// Reports a bad value as a config-file problem pointing at the file.
    fn invalid_value(&self, key: &str, err: Error) -> Error {
        let mut out = Error::new(ErrorKind::Config).with_message(format!(
            "invalid {key} in config file: {}",
            err.message().unwrap_or_default()
        ));
        if let Some(hint) = err.hint() {
            out = out.with_hint(hint.to_string());
        }
        match &self.source {
            Some(path) => out.with_path(path),
            None => out,
        }
    }
}

impl SiteConfig {
    pub fn resolve(overrides: ConfigOverrides, file: Option<ConfigFile>) -> Result<Self, Error> {
        let file = file.unwrap_or_default();

        let bind = match (overrides.bind, &file.bind) {
            (Some(text), _) => parse_bind(&text)?,
            (None, Some(text)) => {
                parse_bind(text).map_err(|err| file.invalid_value("bind", err))?
            }
            (None, None) => parse_bind(DEFAULT_BIND)?,
        };

        let base_url = match (overrides.base_url, &file.base_url) {
            (Some(raw), _) => normalize_base_url(&raw)?,
            (None, Some(raw)) => {
                normalize_base_url(raw).map_err(|err| file.invalid_value("base_url", err))?
            }
            (None, None) => format!("http://{bind}"),
        };

        let static_dir = match overrides.static_dir {
            Some(dir) => dir,
            None => file
                .static_dir
                .clone()
                .map(|dir| file.resolve_path(dir))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        };

        let dev = overrides.dev || file.dev.unwrap_or(false);
        let templates_dir = match overrides.templates_dir {
            Some(dir) => Some(dir),
            None => file.templates_dir.clone().map(|dir| file.resolve_path(dir)),
        };
        // Reloading only makes sense against files on disk.
        let templates_dir = match templates_dir {
            None if dev => Some(PathBuf::from(DEFAULT_TEMPLATES_DIR)),
            other => other,
        };

        Ok(Self {
            bind,
            base_url,
            static_dir,
            templates_dir,
            dev,
        })
    }
}

fn parse_bind(text: &str) -> Result<SocketAddr, Error> {
    text.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid bind address: {text}"))
            .with_hint("Use host:port, for example 127.0.0.1:8080.")
    })
}

pub fn normalize_base_url(raw: &str) -> Result<String, Error> {
    let parsed = Url::parse(raw.trim()).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid base url: {raw}"))
            .with_hint("Use an absolute URL such as https://ddmsence.urizone.net.")
            .with_source(err)
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("base url must use http or https: {raw}")));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("base url must not carry a query or fragment: {raw}")));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
