//! Query key vocabulary
//!
//! Every key is either numeric or string class and belongs to exactly one dataset
//! kind. The two tables are closed enums, so a criterion or aggregation that pairs a
//! key with the wrong operator family cannot be constructed.
//!
//! Resolution happens in two steps: [`resolve_key`] checks the spelling, and
//! [`resolve_field`] checks the key against the dataset kind being queried.

use std::fmt;

use crate::dataset::DatasetKind;
use crate::query::error::{QueryError, QueryResult};

/// Keys holding numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKey {
    Average,
    Pass,
    Fail,
    Audit,
    Year,
    Latitude,
    Longitude,
    Seats,
}

impl NumericKey {
    pub const ALL: [NumericKey; 8] = [
        Self::Average,
        Self::Pass,
        Self::Fail,
        Self::Audit,
        Self::Year,
        Self::Latitude,
        Self::Longitude,
        Self::Seats,
    ];

    /// Spelling used in queries
    pub fn word(&self) -> &'static str {
        match self {
            Self::Average => "Average",
            Self::Pass => "Pass",
            Self::Fail => "Fail",
            Self::Audit => "Audit",
            Self::Year => "Year",
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
            Self::Seats => "Seats",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.word() == word)
    }

    pub fn kind(&self) -> DatasetKind {
        match self {
            Self::Average | Self::Pass | Self::Fail | Self::Audit | Self::Year => {
                DatasetKind::Courses
            }
            Self::Latitude | Self::Longitude | Self::Seats => DatasetKind::Rooms,
        }
    }

    /// Record field this key reads
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Average => "avg",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Audit => "audit",
            Self::Year => "year",
            Self::Latitude => "lat",
            Self::Longitude => "lon",
            Self::Seats => "seats",
        }
    }
}

/// Keys holding strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKey {
    Department,
    Id,
    Instructor,
    Title,
    Uuid,
    FullName,
    ShortName,
    Number,
    Name,
    Address,
    Type,
    Furniture,
    Link,
}

impl StringKey {
    pub const ALL: [StringKey; 13] = [
        Self::Department,
        Self::Id,
        Self::Instructor,
        Self::Title,
        Self::Uuid,
        Self::FullName,
        Self::ShortName,
        Self::Number,
        Self::Name,
        Self::Address,
        Self::Type,
        Self::Furniture,
        Self::Link,
    ];

    /// Spelling used in queries
    pub fn word(&self) -> &'static str {
        match self {
            Self::Department => "Department",
            Self::Id => "ID",
            Self::Instructor => "Instructor",
            Self::Title => "Title",
            Self::Uuid => "UUID",
            Self::FullName => "FullName",
            Self::ShortName => "ShortName",
            Self::Number => "Number",
            Self::Name => "Name",
            Self::Address => "Address",
            Self::Type => "Type",
            Self::Furniture => "Furniture",
            Self::Link => "Link",
        }
    }

    pub fn from_word(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.word() == word)
    }

    pub fn kind(&self) -> DatasetKind {
        match self {
            Self::Department | Self::Id | Self::Instructor | Self::Title | Self::Uuid => {
                DatasetKind::Courses
            }
            _ => DatasetKind::Rooms,
        }
    }

    /// Record field this key reads
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Department => "dept",
            Self::Id => "id",
            Self::Instructor => "instructor",
            Self::Title => "title",
            Self::Uuid => "uuid",
            Self::FullName => "fullname",
            Self::ShortName => "shortname",
            Self::Number => "number",
            Self::Name => "name",
            Self::Address => "address",
            Self::Type => "type",
            Self::Furniture => "furniture",
            Self::Link => "href",
        }
    }
}

/// Any query key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Numeric(NumericKey),
    Text(StringKey),
}

impl Key {
    pub fn word(&self) -> &'static str {
        match self {
            Self::Numeric(k) => k.word(),
            Self::Text(k) => k.word(),
        }
    }

    pub fn kind(&self) -> DatasetKind {
        match self {
            Self::Numeric(k) => k.kind(),
            Self::Text(k) => k.kind(),
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Numeric(k) => k.field_name(),
            Self::Text(k) => k.field_name(),
        }
    }

    /// Output column name, `<kind>_<field>`
    pub fn column_name(&self) -> String {
        format!("{}_{}", self.kind(), self.field_name())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

/// Resolve a key word, trying the numeric table then the string table
pub fn resolve_key(word: &str) -> QueryResult<Key> {
    NumericKey::from_word(word)
        .map(Key::Numeric)
        .or_else(|| StringKey::from_word(word).map(Key::Text))
        .ok_or_else(|| QueryError::UnknownKey(word.to_string()))
}

/// Resolve the record field of `key` for a dataset of `kind`.
///
/// Fails with `KeyDatasetMismatch` when the key belongs to the other kind, even
/// though [`resolve_key`] accepted its spelling.
pub fn resolve_field(key: Key, kind: DatasetKind) -> QueryResult<&'static str> {
    if key.kind() != kind {
        return Err(QueryError::KeyDatasetMismatch {
            key: key.word().to_string(),
            kind,
        });
    }
    Ok(key.field_name())
}

/// Resolve a word and check it against `kind` in one step
pub(crate) fn resolve_scoped(word: &str, kind: DatasetKind) -> QueryResult<Key> {
    let key = resolve_key(word)?;
    resolve_field(key, kind)?;
    Ok(key)
}
