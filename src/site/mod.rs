//! Purpose: Everything specific to the documentation site's HTTP surface.
//! Exports: Route table, page model, templates, static mounts, handlers, forwarded origin.
//! Role: Building blocks assembled into a router by `serve`.
//! Invariants: Modules here hold no global state; `SiteState` is passed explicitly.

pub mod assets;
pub mod forwarded;
pub mod handlers;
pub mod page;
pub mod routes;
pub mod templates;
