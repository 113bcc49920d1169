//! Feed ingestion: streaming parse of a feed document into a [`Blob`].
//!
//! - [`parse_article`], [`parse_content`]: single article / content array parsers
//! - [`Blob`]: national and regional article lists with region filtering and feed ordering
//! - [`ParseOrchestrator`]: background parse guarded by the source lock, with progress events
//!
//! # Example
//!
//! ```no_run
//! use newsblob::feed::{ParseOptions, ParseOrchestrator, ParseOutcome};
//! use newsblob::source::Source;
//!
//! # async fn run() {
//! let orchestrator = ParseOrchestrator::new(ParseOptions::default());
//! let task = orchestrator.parse_file(Some(Source::Home), "cache/HOME.source");
//! match task.wait().await {
//!     ParseOutcome::Parsed(blob) => println!("{} articles", blob.len()),
//!     ParseOutcome::Busy => println!("someone else is parsing"),
//!     other => println!("{:?}", other),
//! }
//! # }
//! ```

mod article;
mod blob;
mod content;
mod date;
mod elements;
mod error;
mod ids;
mod options;
mod orchestrator;

pub use article::parse_article;
pub use blob::Blob;
pub use content::parse_content;
pub use date::{parse_date_text, parse_raw_date, RawDate};
pub use error::{ElementError, ParseError};
pub use ids::{IdGenerator, RandomIds, SequenceIds};
pub use options::{ParseOptions, TextField, TextHook, DEFAULT_LINK_BASE};
pub use orchestrator::{
    CancelHandle, CountingReader, ParseEvent, ParseOrchestrator, ParseOutcome, ParseTask,
    DEFAULT_PROGRESS_INTERVAL,
};
