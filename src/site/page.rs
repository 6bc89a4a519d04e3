//! Purpose: Build the model every template renders against.
//! Exports: `PageModel`.
//! Role: Shared convention: configured base URL + request path + route title.
//! Invariants: `path` is the request path without query string.
//! Invariants: Failure fields are only present on the 500 page.

use serde::Serialize;

use crate::core::error::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageModel {
    pub base_url: String,
    pub path: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl PageModel {
    pub fn build(base_url: &str, path: &str, title: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            path: path.to_string(),
            title: title.to_string(),
            message: None,
            stack_trace: None,
        }
    }

    pub fn with_failure(mut self, err: &Error) -> Self {
        self.message = Some(err.message().unwrap_or_default().to_string());
        self.stack_trace = Some(err.chain_text());
        self
    }

    /// Failure fields for a caught panic, which has a payload but no error chain.
    pub fn with_panic(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self.stack_trace = Some(format!("panic: {message}"));
        self
    }

    pub fn canonical_url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::PageModel;
    use crate::core::error::{Error, ErrorKind};

    #[test]
    fn build_carries_shared_context() {
        let model = PageModel::build("https://ddmsence.urizone.net", "/license.jsp", "License");
        assert_eq!(model.canonical_url(), "https://ddmsence.urizone.net/license.jsp");
        let value = serde_json::to_value(&model).expect("json");
        assert_eq!(value["title"], "License");
        assert_eq!(value["path"], "/license.jsp");
        assert!(value.get("message").is_none());
        assert!(value.get("stack_trace").is_none());
    }

    #[test]
    fn failure_adds_message_and_trace() {
        let cause = std::io::Error::other("disk gone");
        let err = Error::new(ErrorKind::Template)
            .with_message("failed to render home")
            .with_source(cause);
        let model = PageModel::build("http://localhost", "/index.jsp", "500").with_failure(&err);
        assert_eq!(model.message.as_deref(), Some("failed to render home"));
        let trace = model.stack_trace.expect("trace");
        assert!(trace.starts_with("Template: failed to render home"));
        assert!(trace.contains("caused by: disk gone"));
    }

    #[test]
    fn failure_without_message_is_empty_string() {
        let err = Error::new(ErrorKind::Internal);
        let model = PageModel::build("http://localhost", "/", "500").with_failure(&err);
        assert_eq!(model.message.as_deref(), Some(""));
    }
}
