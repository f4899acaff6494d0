//! Medicine price collector.
//!
//! Walks the price observatory catalog for every (region, product name) pair,
//! resolves each price entry's pharmacy and product through the detail endpoint
//! and merges everything into one dataset.
//!
//! The pipeline, leaf to root:
//! - [`request`]: posts JSON to an [`request::Endpoint`] and unwraps the envelope, with retries.
//! - [`names`]: enumerates the product names to search for.
//! - [`pages`]: walks every result page for one (name, region) pair.
//! - [`resolve`]: memoized pharmacy/product resolution.
//! - [`worker`]: one region's collection loop.
//! - [`process`]: fans out one worker per region and merges their results.

mod error;
mod macros;
mod parse;

pub mod config;
pub mod logging;
pub mod model;
pub mod names;
pub mod pages;
pub mod process;
pub mod progress;
pub mod request;
pub mod resolve;
pub mod store;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::{Error, Result, SendError};

pub const DEFAULT_BASE_URL: &str = "https://opmcovid.minsa.gob.pe";
/// Names shorter than this (in characters, after normalization) are not searched for.
pub const MIN_NAME_LEN: usize = 5;
/// Autocomplete entries look like `NAME - PRESENTATION`; only the part before this is kept.
pub const NAME_SEPARATOR: char = '-';
const ENVELOPE_FIELD: &str = "d";
const PAGE_COUNT_FIELD: &str = "tpaginas";
