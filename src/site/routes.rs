//! Purpose: The fixed route table mapping page URLs to templates and titles.
//! Exports: `Page`, `pages`, `find`, `ROOT_REDIRECT`, `NOT_FOUND`, `INTERNAL_ERROR`.
//! Role: Sole source of truth for which pages exist; the router and CLI read it.
//! Invariants: Paths are unique, absolute, and matched case-sensitively.
//! Invariants: Every template named here ships in `templates/`.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    pub path: &'static str,
    pub template: &'static str,
    pub title: &'static str,
}

impl Page {
    const fn new(path: &'static str, template: &'static str, title: &'static str) -> Self {
        Self {
            path,
            template,
            title,
        }
    }
}

/// `/` answers with a redirect to this page.
pub const ROOT_REDIRECT: &str = "/index.jsp";

pub const NOT_FOUND: Page = Page::new("", "404", "404 Not Found");
pub const INTERNAL_ERROR: Page = Page::new("", "500", "500 Internal Server Error");

static PAGES: [Page; 19] = [
    Page::new("/index.jsp", "home", "Home"),
    Page::new("/documentation.jsp", "documentation", "Documentation"),
    Page::new(
        "/documentation-attributes.jsp",
        "documentation-attributes",
        "Power Tip - Common Attribute Groups",
    ),
    Page::new(
        "/documentation-builders.jsp",
        "documentation-builders",
        "Power Tip - Using Component Builders",
    ),
    Page::new(
        "/documentation-configuration.jsp",
        "documentation-configuration",
        "Power Tip: Configurable Properties",
    ),
    Page::new(
        "/documentation-differentIsm.jsp",
        "documentation-differentIsm",
        "Power Tip: Using Alternate Versions of Intelligence Community Specifications",
    ),
    Page::new(
        "/documentation-extensible.jsp",
        "documentation-extensible",
        "Power Tip -The Extensible Layer",
    ),
    Page::new(
        "/documentation-multithreaded.jsp",
        "documentation-multithreaded",
        "Power Tip - Thread Safety",
    ),
    Page::new(
        "/documentation-schematron.jsp",
        "documentation-schematron",
        "Power Tip - Schematron Validation",
    ),
    Page::new(
        "/documentation-version.jsp",
        "documentation-version",
        "Power Tip - Working With Different DDMS Versions",
    ),
    Page::new("/downloads.jsp", "downloads", "Downloads"),
    Page::new("/license.jsp", "license", "License"),
    Page::new(
        "/relationalTables.jsp",
        "relationalTables",
        "Relational Database Model for DDMS 3.1",
    ),
    Page::new(
        "/releaseNotes-2.2.0.jsp",
        "releaseNotes-2.2.0",
        "What's New in DDMS 5.0 / DDMSence 2.2.0",
    ),
    Page::new(
        "/schematron.jsp",
        "schematron",
        "Schematron Implementation for DDMS",
    ),
    Page::new("/tutorials-01.jsp", "tutorials-01", "Tutorial #1 (Essentials)"),
    Page::new("/tutorials-02.jsp", "tutorials-02", "Tutorial #2 (Escort)"),
    Page::new("/tutorials-03.jsp", "tutorials-03", "Tutorial #3 (Escape)"),
    Page::new(
        "/upgrade-2.0.0.jsp",
        "upgrade-2.0.0",
        "Upgrade Guide: Version 1.x to 2.x",
    ),
];

pub fn pages() -> &'static [Page] {
    &PAGES
}

pub fn find(path: &str) -> Option<&'static Page> {
    PAGES.iter().find(|page| page.path == path)
}

#[cfg(test)]
mod tests {
    use super::{INTERNAL_ERROR, NOT_FOUND, ROOT_REDIRECT, find, pages};
    use std::collections::HashSet;

    #[test]
    fn paths_are_unique_and_absolute() {
        let mut seen = HashSet::new();
        for page in pages() {
            assert!(page.path.starts_with('/'), "{}", page.path);
            assert!(seen.insert(page.path), "duplicate path {}", page.path);
        }
        assert_eq!(seen.len(), 19);
    }

    #[test]
    fn templates_follow_path_names() {
        for page in pages().iter().filter(|page| page.path != "/index.jsp") {
            let stem = page
                .path
                .trim_start_matches('/')
                .trim_end_matches(".jsp");
            assert_eq!(stem, page.template);
        }
        assert_eq!(find("/index.jsp").map(|page| page.template), Some("home"));
    }

    #[test]
    fn find_is_exact_and_case_sensitive() {
        let page = find("/tutorials-02.jsp").expect("tutorial page");
        assert_eq!(page.title, "Tutorial #2 (Escort)");
        assert!(find("/Tutorials-02.jsp").is_none());
        assert!(find("/tutorials-02.jsp/").is_none());
        assert!(find("/").is_none());
    }

    #[test]
    fn redirect_target_is_a_page() {
        assert!(find(ROOT_REDIRECT).is_some());
    }

    #[test]
    fn error_pages_are_not_routable() {
        assert_eq!(NOT_FOUND.template, "404");
        assert_eq!(INTERNAL_ERROR.title, "500 Internal Server Error");
        assert!(pages().iter().all(|page| page.template != "404" && page.template != "500"));
    }
}
