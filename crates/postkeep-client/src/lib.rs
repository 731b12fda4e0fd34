//! Postkeep client
//!
//! Typed access to the Postkeep HTTP API, plus the importer that feeds
//! crawler output files into a running server.

pub mod client;
pub mod error;
pub mod import;

pub use client::{PostsClient, RetryPolicy, SubmitReport};
pub use error::{ClientError, Result};
pub use import::{parse_dump, DumpFormat, ParsedDump};
