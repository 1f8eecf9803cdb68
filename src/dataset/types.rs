//! Core record types for insight datasets
//!
//! This module defines the fixed record schemas the query engine runs over:
//! - `CourseSection`: one offering of a course, with grade statistics
//! - `Room`: one bookable campus room
//! - `Records` / `Dataset`: a loaded, immutable collection of one kind
//! - `Record`: field access by query key, shared by both schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::dataset::error::DatasetError;
use crate::query::{Key, NumericKey, StringKey};

/// Kind of records held by a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Courses,
    Rooms,
}

impl DatasetKind {
    /// Lowercase name, as written in queries and output columns
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Courses => "courses",
            Self::Rooms => "rooms",
        }
    }

    /// Parse the kind word used in `In <kind> dataset <id>`
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "courses" => Some(Self::Courses),
            "rooms" => Some(Self::Rooms),
            _ => None,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_word(&s.to_lowercase()).ok_or_else(|| DatasetError::UnknownKind(s.to_string()))
    }
}

/// Borrowed view of a single record field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRef<'a> {
    Number(f64),
    Text(&'a str),
}

/// Field access shared by every record schema
pub trait Record: Send + Sync {
    /// Dataset kind this schema belongs to
    const KIND: DatasetKind;

    /// Numeric field for `key`, or `None` when the key belongs to the other kind
    fn number(&self, key: NumericKey) -> Option<f64>;

    /// String field for `key`, or `None` when the key belongs to the other kind
    fn text(&self, key: StringKey) -> Option<&str>;

    fn field(&self, key: Key) -> Option<FieldRef<'_>> {
        match key {
            Key::Numeric(k) => self.number(k).map(FieldRef::Number),
            Key::Text(k) => self.text(k).map(FieldRef::Text),
        }
    }
}

/// One section of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSection {
    /// Department code, e.g. "cpsc"
    pub dept: String,
    /// Course number within the department, e.g. "310"
    pub id: String,
    pub instructor: String,
    pub title: String,
    pub pass: f64,
    pub fail: f64,
    pub audit: f64,
    /// Section average grade
    pub avg: f64,
    /// Unique section identifier
    pub uuid: String,
    pub year: f64,
}

impl Record for CourseSection {
    const KIND: DatasetKind = DatasetKind::Courses;

    fn number(&self, key: NumericKey) -> Option<f64> {
        match key {
            NumericKey::Average => Some(self.avg),
            NumericKey::Pass => Some(self.pass),
            NumericKey::Fail => Some(self.fail),
            NumericKey::Audit => Some(self.audit),
            NumericKey::Year => Some(self.year),
            NumericKey::Latitude | NumericKey::Longitude | NumericKey::Seats => None,
        }
    }

    fn text(&self, key: StringKey) -> Option<&str> {
        match key {
            StringKey::Department => Some(&self.dept),
            StringKey::Id => Some(&self.id),
            StringKey::Instructor => Some(&self.instructor),
            StringKey::Title => Some(&self.title),
            StringKey::Uuid => Some(&self.uuid),
            _ => None,
        }
    }
}

/// One campus room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Building full name, e.g. "Hugh Dempster Pavilion"
    pub fullname: String,
    /// Building short name, e.g. "DMP"
    pub shortname: String,
    /// Room number within the building (not always numeric)
    pub number: String,
    /// `<shortname>_<number>`
    pub name: String,
    pub address: String,
    pub seats: f64,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "type")]
    pub r#type: String,
    pub furniture: String,
    /// Link to the room's detail page
    pub href: String,
}

impl Record for Room {
    const KIND: DatasetKind = DatasetKind::Rooms;

    fn number(&self, key: NumericKey) -> Option<f64> {
        match key {
            NumericKey::Latitude => Some(self.lat),
            NumericKey::Longitude => Some(self.lon),
            NumericKey::Seats => Some(self.seats),
            _ => None,
        }
    }

    fn text(&self, key: StringKey) -> Option<&str> {
        match key {
            StringKey::FullName => Some(&self.fullname),
            StringKey::ShortName => Some(&self.shortname),
            StringKey::Number => Some(&self.number),
            StringKey::Name => Some(&self.name),
            StringKey::Address => Some(&self.address),
            StringKey::Type => Some(&self.r#type),
            StringKey::Furniture => Some(&self.furniture),
            StringKey::Link => Some(&self.href),
            _ => None,
        }
    }
}

/// The records of one dataset, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "records", rename_all = "lowercase")]
pub enum Records {
    Courses(Vec<CourseSection>),
    Rooms(Vec<Room>),
}

impl Records {
    pub fn kind(&self) -> DatasetKind {
        match self {
            Self::Courses(_) => DatasetKind::Courses,
            Self::Rooms(_) => DatasetKind::Rooms,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Courses(sections) => sections.len(),
            Self::Rooms(rooms) => rooms.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered dataset: an immutable snapshot of records under an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub added_at: DateTime<Utc>,
    pub records: Records,
}

impl Dataset {
    /// Create a dataset stamped with the current time
    pub fn new(id: impl Into<String>, records: Records) -> Self {
        Self {
            id: id.into(),
            added_at: Utc::now(),
            records,
        }
    }

    pub fn kind(&self) -> DatasetKind {
        self.records.kind()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Summary used for listings
    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            id: self.id.clone(),
            kind: self.kind(),
            num_rows: self.len(),
            added_at: self.added_at,
        }
    }
}

/// Listing entry for a registered dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub kind: DatasetKind,
    pub num_rows: usize,
    pub added_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::{room, section};

    #[test]
    fn test_kind_parsing() {
        assert_eq!(DatasetKind::from_word("courses"), Some(DatasetKind::Courses));
        assert_eq!(DatasetKind::from_word("rooms"), Some(DatasetKind::Rooms));
        assert_eq!(DatasetKind::from_word("Courses"), None);
        assert_eq!("ROOMS".parse::<DatasetKind>().unwrap(), DatasetKind::Rooms);
        assert!(matches!(
            "buildings".parse::<DatasetKind>(),
            Err(DatasetError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_section_field_access() {
        let s = section("cpsc", "310", 87.5);
        assert_eq!(s.number(NumericKey::Average), Some(87.5));
        assert_eq!(s.text(StringKey::Department), Some("cpsc"));
        assert_eq!(s.number(NumericKey::Seats), None);
        assert_eq!(s.text(StringKey::FullName), None);
        assert_eq!(
            s.field(Key::Text(StringKey::Id)),
            Some(FieldRef::Text("310"))
        );
    }

    #[test]
    fn test_room_field_access() {
        let r = room("DMP", "110", 120.0);
        assert_eq!(r.number(NumericKey::Seats), Some(120.0));
        assert_eq!(r.text(StringKey::Name), Some("DMP_110"));
        assert_eq!(r.text(StringKey::Link), Some(r.href.as_str()));
        assert_eq!(r.number(NumericKey::Average), None);
    }

    #[test]
    fn test_dataset_json_shape() {
        let dataset = Dataset::new("rooms", Records::Rooms(vec![room("DMP", "110", 120.0)]));
        let json = serde_json::to_value(&dataset).unwrap();

        assert_eq!(json["records"]["kind"], "rooms");
        assert_eq!(json["records"]["records"][0]["type"], "Small Group");

        let back: Dataset = serde_json::from_value(json).unwrap();
        assert_eq!(back, dataset);
        assert_eq!(back.info().num_rows, 1);
        assert_eq!(back.kind(), DatasetKind::Rooms);
    }
}
