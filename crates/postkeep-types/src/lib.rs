//! Postkeep Types - record definitions shared by the server and the client
//!
//! This crate contains only pure data types and their text codec, with no
//! async runtime dependencies.

pub mod error;
pub mod id;
pub mod record;

pub use error::*;
pub use id::*;
pub use record::*;

/// Delimiter between fields of a snapshot line
pub const DELIMITER: char = ';';
