//! Post records and their snapshot line codec

use crate::error::{RecordError, Result};
use crate::id::is_post_id;
use crate::DELIMITER;
use serde::{Deserialize, Serialize};

/// Record fields, in snapshot column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    UniqueId,
    Url,
    Username,
    UserKarma,
    CakeDay,
    PostKarma,
    CommentKarma,
    PostDate,
    CommentCount,
    VoteCount,
    Category,
}

impl Field {
    /// Every field in snapshot column order
    pub const ALL: [Field; 11] = [
        Field::UniqueId,
        Field::Url,
        Field::Username,
        Field::UserKarma,
        Field::CakeDay,
        Field::PostKarma,
        Field::CommentKarma,
        Field::PostDate,
        Field::CommentCount,
        Field::VoteCount,
        Field::Category,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// JSON key of the field
    pub fn name(&self) -> &'static str {
        match self {
            Field::UniqueId => "unique_id",
            Field::Url => "url",
            Field::Username => "username",
            Field::UserKarma => "user_karma",
            Field::CakeDay => "cake_day",
            Field::PostKarma => "post_karma",
            Field::CommentKarma => "comment_karma",
            Field::PostDate => "post_date",
            Field::CommentCount => "comment_count",
            Field::VoteCount => "vote_count",
            Field::Category => "category",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One scraped post together with facts about its author.
///
/// Every value is opaque text. Missing JSON keys deserialize to empty
/// strings; only `unique_id` is checked by [`Record::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub unique_id: String,
    pub url: String,
    pub username: String,
    pub user_karma: String,
    pub cake_day: String,
    pub post_karma: String,
    pub comment_karma: String,
    pub post_date: String,
    pub comment_count: String,
    pub vote_count: String,
    pub category: String,
}

impl Record {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::UniqueId => &self.unique_id,
            Field::Url => &self.url,
            Field::Username => &self.username,
            Field::UserKarma => &self.user_karma,
            Field::CakeDay => &self.cake_day,
            Field::PostKarma => &self.post_karma,
            Field::CommentKarma => &self.comment_karma,
            Field::PostDate => &self.post_date,
            Field::CommentCount => &self.comment_count,
            Field::VoteCount => &self.vote_count,
            Field::Category => &self.category,
        }
    }

    fn slot(&mut self, field: Field) -> &mut String {
        match field {
            Field::UniqueId => &mut self.unique_id,
            Field::Url => &mut self.url,
            Field::Username => &mut self.username,
            Field::UserKarma => &mut self.user_karma,
            Field::CakeDay => &mut self.cake_day,
            Field::PostKarma => &mut self.post_karma,
            Field::CommentKarma => &mut self.comment_karma,
            Field::PostDate => &mut self.post_date,
            Field::CommentCount => &mut self.comment_count,
            Field::VoteCount => &mut self.vote_count,
            Field::Category => &mut self.category,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        *self.slot(field) = value.into();
    }

    /// Check that the record can be stored and written to a snapshot line.
    pub fn validate(&self) -> Result<()> {
        if self.unique_id.is_empty() {
            return Err(RecordError::MissingId);
        }
        if !is_post_id(&self.unique_id) {
            return Err(RecordError::InvalidId(self.unique_id.clone()));
        }
        for field in Field::ALL {
            check_value(field, self.get(field))?;
        }
        Ok(())
    }

    /// Encode as a snapshot line, without the trailing newline.
    pub fn to_line(&self) -> String {
        self.to_delimited(&Field::ALL)
    }

    /// Decode a snapshot line.
    pub fn from_line(line: &str) -> Result<Self> {
        Self::from_delimited(line, &Field::ALL)
    }

    /// Encode with an arbitrary column layout.
    pub fn to_delimited(&self, layout: &[Field]) -> String {
        let mut line = String::new();
        for (i, field) in layout.iter().enumerate() {
            if i > 0 {
                line.push(DELIMITER);
            }
            line.push_str(self.get(*field));
        }
        line
    }

    /// Decode a line whose columns follow `layout`.
    ///
    /// Fields absent from the layout stay empty.
    pub fn from_delimited(line: &str, layout: &[Field]) -> Result<Self> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let parts: Vec<&str> = line.split(DELIMITER).collect();
        if parts.len() != layout.len() {
            return Err(RecordError::FieldCount {
                expected: layout.len(),
                found: parts.len(),
            });
        }

        let mut record = Record::default();
        for (field, value) in layout.iter().zip(parts) {
            record.set(*field, value);
        }
        Ok(record)
    }
}

fn check_value(field: Field, value: &str) -> Result<()> {
    if value.contains(&[DELIMITER, '\n', '\r'][..]) {
        return Err(RecordError::IllegalCharacter { field: field.name() });
    }
    Ok(())
}

/// Partial update of a record; only fields that are present are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordPatch {
    /// Accepted so that callers may send a full record back; it must match
    /// the id being updated and is never applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_karma: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cake_day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_karma: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_karma: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl RecordPatch {
    /// Present fields other than `unique_id`
    pub fn changes(&self) -> Vec<(Field, &str)> {
        [
            (Field::Url, &self.url),
            (Field::Username, &self.username),
            (Field::UserKarma, &self.user_karma),
            (Field::CakeDay, &self.cake_day),
            (Field::PostKarma, &self.post_karma),
            (Field::CommentKarma, &self.comment_karma),
            (Field::PostDate, &self.post_date),
            (Field::CommentCount, &self.comment_count),
            (Field::VoteCount, &self.vote_count),
            (Field::Category, &self.category),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }

    /// Check the patch against the id it is applied to.
    pub fn validate(&self, id: &str) -> Result<()> {
        if let Some(body_id) = &self.unique_id {
            if body_id != id {
                return Err(RecordError::IdMismatch {
                    path: id.to_string(),
                    body: body_id.clone(),
                });
            }
        }
        for (field, value) in self.changes() {
            check_value(field, value)?;
        }
        Ok(())
    }

    /// Merge present fields into `record`, leaving the rest untouched.
    pub fn apply_to(&self, record: &mut Record) {
        for (field, value) in self.changes() {
            record.set(field, value);
        }
    }
}
