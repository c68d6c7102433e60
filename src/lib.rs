//! Clay News - a county news feed and site backend
//!
//! This crate ingests a local radio station's RSS feed into a JSON article
//! feed, then serves town summary pages and a county-wide hub page. The
//! behavioral core is the feed selector in [`selector`], which decides which
//! articles a page shows and in which display mode.

pub mod config;
pub mod fetcher;
pub mod ingest;
pub mod routes;
pub mod selector;
