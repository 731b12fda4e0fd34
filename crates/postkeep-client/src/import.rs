//! Parsing of crawler output files
//!
//! The crawler writes one `;`-joined line per post, in the order it collects
//! the fields, which differs from the server's snapshot order. Server
//! snapshots can be imported too, e.g. to move a previous day's records into
//! a running server.

use clap::ValueEnum;
use postkeep_types::{new_post_id, Field, Record, RecordError};

/// Column order of a crawler dump line
pub const CRAWLER_LAYOUT: [Field; 11] = [
    Field::UniqueId,
    Field::Url,
    Field::Username,
    Field::PostDate,
    Field::CommentCount,
    Field::VoteCount,
    Field::Category,
    Field::PostKarma,
    Field::CommentKarma,
    Field::UserKarma,
    Field::CakeDay,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DumpFormat {
    /// Output of the crawler
    #[default]
    Crawler,
    /// A server snapshot file
    Snapshot,
}

impl DumpFormat {
    pub fn layout(&self) -> &'static [Field] {
        match self {
            DumpFormat::Crawler => &CRAWLER_LAYOUT,
            DumpFormat::Snapshot => &Field::ALL,
        }
    }
}

#[derive(Debug, Default)]
pub struct ParsedDump {
    pub records: Vec<Record>,
    /// 1-based line number and reason for every line that was not usable
    pub rejected: Vec<(usize, RecordError)>,
}

/// Parse every non-blank line of `content`.
///
/// Lines with an empty id get a fresh time-ordered id.
pub fn parse_dump(content: &str, format: DumpFormat) -> ParsedDump {
    let mut parsed = ParsedDump::default();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let result = Record::from_delimited(line, format.layout()).and_then(|mut record| {
            if record.unique_id.is_empty() {
                record.unique_id = new_post_id();
            }
            record.validate()?;
            Ok(record)
        });

        match result {
            Ok(record) => parsed.records.push(record),
            Err(e) => parsed.rejected.push((index + 1, e)),
        }
    }

    parsed
}
