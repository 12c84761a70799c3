//! Freshet keeps a local database of syndication feeds in sync with
//! their sources and audits it for duplicates.
//!
//! The flow for one feed: [`policy`] decides whether it is due,
//! [`fetcher`] pulls and parses the document, [`normalizer`] picks the
//! best content for each entry, [`reconcile`] matches candidates against
//! stored items and decides insert/update/skip, and [`pipeline`] ties
//! those together and owns failure recording. [`audit`] runs separately
//! over the whole database. [`store`] is the persistence seam.

pub mod app;
pub mod audit;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod fetcher;
pub mod normalizer;
pub mod pipeline;
pub mod policy;
pub mod reconcile;
pub mod store;
pub mod util;
