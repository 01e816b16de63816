//! shelfcrawl - resumable catalog crawler for JavaScript-rendered storefronts.
//!
//! Walks a storefront's category hierarchy depth-first, exhausts lazily
//! loaded listings, and appends one record per item detail page to a CSV
//! store. Re-running against the same store skips everything already
//! extracted.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod models;
pub mod repository;
pub mod scrapers;
