//! Scrapes municipal indicators from the IBGE cities portal, one shard of cities per
//! worker, and merges the finished shards into one table per indicator category.
//!
//! A run can be killed at any point: shards that were marked complete are skipped
//! next time, everything else is redone from scratch.

mod macros;

pub mod category;
pub mod cities;
pub mod config;
mod error;
pub mod fetch;
pub mod merge;
pub mod orchestrator;
pub mod parse;
pub mod retry;
pub mod session;
pub mod shard;
pub mod store;
pub mod tsv;
pub mod warehouse;
pub mod worker;

pub use error::{Error, Result};
