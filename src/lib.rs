//! Purpose: Library crate behind the `ddmsence-site` documentation server.
//! Exports: `core` (config, errors), `site` (routes, pages, templates, assets), `serve`.
//! Role: Keeps the binary thin and lets tests drive the router in-process.
//! Invariants: The route table in `site::routes` is the only list of pages.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod core;
pub mod serve;
pub mod site;
