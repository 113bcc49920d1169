//! Streaming ingestion of news feed documents.
//!
//! - [`feed`]: parser, feed assembly and background parse orchestration
//! - [`model`]: immutable article and content types
//! - [`filter`]: text and region filters over parsed articles
//! - [`source`]: the fixed set of feed sources and their locks
//! - [`config`]: TOML configuration
//! - [`util`]: text normalization, quotation marks, link resolution

pub mod config;
pub mod feed;
pub mod filter;
pub mod model;
pub mod source;
pub mod util;
