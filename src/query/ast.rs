//! Query Plan
//!
//! The validated, immutable form of one query string. Simple and grouped queries
//! share a single [`QueryPlan`]; grouped queries carry a [`Grouping`] payload.
//!
//! # Example Queries
//!
//! ```text
//! In courses dataset courses, find entries whose Average is greater than 90; show Department and Average.
//! In rooms dataset rooms grouped by ShortName, find all entries; show ShortName and seats, where seats is the SUM of Seats.
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::dataset::{DatasetKind, FieldRef, Record};
use crate::query::error::{QueryError, QueryResult};
use crate::query::keys::{Key, NumericKey, StringKey};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Combinator between consecutive criteria
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

/// Operators valid for numeric keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    Equal,
    Greater,
    Less,
    NotEqual,
    NotGreater,
    NotLess,
}

impl NumericOp {
    pub const ALL: [NumericOp; 6] = [
        Self::Equal,
        Self::Greater,
        Self::Less,
        Self::NotEqual,
        Self::NotGreater,
        Self::NotLess,
    ];

    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Equal => "is equal to",
            Self::Greater => "is greater than",
            Self::Less => "is less than",
            Self::NotEqual => "is not equal to",
            Self::NotGreater => "is not greater than",
            Self::NotLess => "is not less than",
        }
    }

    pub fn from_phrase(phrase: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.phrase() == phrase)
    }

    /// Compare a field value against the operand
    pub fn compare(&self, value: f64, operand: f64) -> bool {
        match self {
            Self::Equal => value == operand,
            Self::Greater => value > operand,
            Self::Less => value < operand,
            Self::NotEqual => value != operand,
            Self::NotGreater => value <= operand,
            Self::NotLess => value >= operand,
        }
    }
}

/// Operators valid for string keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Is,
    IsNot,
    Includes,
    NotIncludes,
    BeginsWith,
    NotBeginsWith,
    EndsWith,
    NotEndsWith,
}

impl StringOp {
    pub const ALL: [StringOp; 8] = [
        Self::Is,
        Self::IsNot,
        Self::Includes,
        Self::NotIncludes,
        Self::BeginsWith,
        Self::NotBeginsWith,
        Self::EndsWith,
        Self::NotEndsWith,
    ];

    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::Includes => "includes",
            Self::NotIncludes => "does not include",
            Self::BeginsWith => "begins with",
            Self::NotBeginsWith => "does not begin with",
            Self::EndsWith => "ends with",
            Self::NotEndsWith => "does not end with",
        }
    }

    pub fn from_phrase(phrase: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.phrase() == phrase)
    }

    /// Match a field value against the operand
    pub fn matches(&self, value: &str, operand: &str) -> bool {
        match self {
            Self::Is => value == operand,
            Self::IsNot => value != operand,
            Self::Includes => value.contains(operand),
            Self::NotIncludes => !value.contains(operand),
            Self::BeginsWith => value.starts_with(operand),
            Self::NotBeginsWith => !value.starts_with(operand),
            Self::EndsWith => value.ends_with(operand),
            Self::NotEndsWith => !value.ends_with(operand),
        }
    }
}

/// One predicate of a filter; the key class fixes the operator family
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Numeric {
        key: NumericKey,
        op: NumericOp,
        operand: f64,
    },
    Text {
        key: StringKey,
        op: StringOp,
        operand: String,
    },
}

impl Criterion {
    pub fn key(&self) -> Key {
        match self {
            Self::Numeric { key, .. } => Key::Numeric(*key),
            Self::Text { key, .. } => Key::Text(*key),
        }
    }

    /// Whether a record satisfies this criterion
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        match self {
            Self::Numeric { key, op, operand } => record
                .number(*key)
                .map(|value| op.compare(value, *operand))
                .unwrap_or(false),
            Self::Text { key, op, operand } => record
                .text(*key)
                .map(|value| op.matches(value, operand))
                .unwrap_or(false),
        }
    }
}

/// Compiled filter clause
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// `find all entries`
    MatchAll,
    /// First criterion, then each further criterion with the connector before it
    Chain {
        first: Criterion,
        rest: Vec<(Connector, Criterion)>,
    },
}

impl FilterExpr {
    /// Criteria in clause order
    pub fn criteria(&self) -> Vec<&Criterion> {
        match self {
            Self::MatchAll => Vec::new(),
            Self::Chain { first, rest } => std::iter::once(first)
                .chain(rest.iter().map(|(_, c)| c))
                .collect(),
        }
    }

    /// Connectors in clause order; always one fewer than the criteria
    pub fn connectors(&self) -> Vec<Connector> {
        match self {
            Self::MatchAll => Vec::new(),
            Self::Chain { rest, .. } => rest.iter().map(|(c, _)| *c).collect(),
        }
    }
}

/// Aggregation function named in an apply clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggregateFunction {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "COUNT" => Some(Self::Count),
            _ => None,
        }
    }

    /// Pair the function with a key, enforcing that only COUNT takes string keys
    pub fn bind(self, key: Key) -> QueryResult<AggregateOp> {
        let numeric = match key {
            Key::Numeric(k) => Some(k),
            Key::Text(_) => None,
        };

        match (self, numeric) {
            (Self::Count, _) => Ok(AggregateOp::Count(key)),
            (Self::Min, Some(k)) => Ok(AggregateOp::Min(k)),
            (Self::Max, Some(k)) => Ok(AggregateOp::Max(k)),
            (Self::Sum, Some(k)) => Ok(AggregateOp::Sum(k)),
            (Self::Avg, Some(k)) => Ok(AggregateOp::Avg(k)),
            (function, None) => Err(QueryError::InvalidAggregation(format!(
                "{} requires a numeric key, got {}",
                function, key
            ))),
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => write!(f, "MIN"),
            Self::Max => write!(f, "MAX"),
            Self::Sum => write!(f, "SUM"),
            Self::Avg => write!(f, "AVG"),
            Self::Count => write!(f, "COUNT"),
        }
    }
}

/// A function bound to a key of the class it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min(NumericKey),
    Max(NumericKey),
    Sum(NumericKey),
    Avg(NumericKey),
    Count(Key),
}

impl AggregateOp {
    pub fn function(&self) -> AggregateFunction {
        match self {
            Self::Min(_) => AggregateFunction::Min,
            Self::Max(_) => AggregateFunction::Max,
            Self::Sum(_) => AggregateFunction::Sum,
            Self::Avg(_) => AggregateFunction::Avg,
            Self::Count(_) => AggregateFunction::Count,
        }
    }

    pub fn key(&self) -> Key {
        match self {
            Self::Min(k) | Self::Max(k) | Self::Sum(k) | Self::Avg(k) => Key::Numeric(*k),
            Self::Count(k) => *k,
        }
    }

    /// Compute the aggregate over one non-empty partition
    pub fn apply<R: Record>(&self, partition: &[&R]) -> QueryResult<f64> {
        match self {
            Self::Min(k) => Ok(numbers(partition, *k)?
                .into_iter()
                .fold(f64::INFINITY, f64::min)),
            Self::Max(k) => Ok(numbers(partition, *k)?
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max)),
            Self::Sum(k) => Ok(round2(numbers(partition, *k)?.into_iter().sum())),
            Self::Avg(k) => exact_average(&numbers(partition, *k)?),
            Self::Count(k) => {
                let mut distinct = HashSet::new();
                for record in partition {
                    let value = record.field(*k).ok_or_else(|| missing_field(*k))?;
                    distinct.insert(ValueKey::from(value));
                }
                Ok(distinct.len() as f64)
            }
        }
    }
}

fn missing_field(key: Key) -> QueryError {
    QueryError::Execution(format!("record has no {} field", key.field_name()))
}

fn numbers<R: Record>(partition: &[&R], key: NumericKey) -> QueryResult<Vec<f64>> {
    partition
        .iter()
        .map(|record| record.number(key).ok_or_else(|| missing_field(Key::Numeric(key))))
        .collect()
}

/// Shortest decimal rendering of an f64 as an exact decimal
fn to_decimal(value: f64) -> QueryResult<Decimal> {
    Decimal::from_str(&value.to_string())
        .or_else(|_| Decimal::try_from(value))
        .map_err(|_| QueryError::Execution(format!("{} is out of decimal range", value)))
}

/// Mean accumulated in exact decimal arithmetic, rounded half away from zero
fn exact_average(values: &[f64]) -> QueryResult<f64> {
    let overflow = || QueryError::Execution("average overflowed".to_string());

    let mut total = Decimal::ZERO;
    for value in values {
        total = total.checked_add(to_decimal(*value)?).ok_or_else(overflow)?;
    }

    total
        .checked_div(Decimal::from(values.len()))
        .ok_or_else(overflow)?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .ok_or_else(overflow)
}

/// Round to 2 decimal places, half away from zero, on the value's decimal rendering
pub fn round2(value: f64) -> f64 {
    match Decimal::from_str(&value.to_string()) {
        Ok(exact) => exact
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or(value),
        Err(_) => (value * 100.0).round() / 100.0,
    }
}

/// Hashable identity of a field value, for grouping and distinct counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey<'a> {
    Number(u64),
    Text(&'a str),
}

impl<'a> From<FieldRef<'a>> for ValueKey<'a> {
    fn from(value: FieldRef<'a>) -> Self {
        match value {
            // -0.0 and 0.0 are the same value
            FieldRef::Number(n) if n == 0.0 => ValueKey::Number(0f64.to_bits()),
            FieldRef::Number(n) => ValueKey::Number(n.to_bits()),
            FieldRef::Text(s) => ValueKey::Text(s),
        }
    }
}

/// A named aggregation from the apply clause
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    alias: String,
    op: AggregateOp,
}

impl Aggregation {
    pub fn new(alias: impl Into<String>, op: AggregateOp) -> Self {
        Self {
            alias: alias.into(),
            op,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    pub fn function(&self) -> AggregateFunction {
        self.op.function()
    }

    pub fn key(&self) -> Key {
        self.op.key()
    }
}

/// A display or sort entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Key(Key),
    Alias(String),
}

impl Column {
    /// Name of the output field
    pub fn name(&self) -> String {
        match self {
            Self::Key(key) => key.column_name(),
            Self::Alias(alias) => alias.clone(),
        }
    }
}

/// Grouping payload of a grouped query
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub keys: Vec<Key>,
    pub aggregations: Vec<Aggregation>,
}

/// Sort clause of a plan
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub direction: SortDirection,
    pub targets: Vec<Column>,
}

/// A fully validated query, ready for execution
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    dataset_id: String,
    kind: DatasetKind,
    filter: FilterExpr,
    grouping: Option<Grouping>,
    projection: Vec<Column>,
    sort: Option<SortSpec>,
}

impl QueryPlan {
    pub(crate) fn new(
        dataset_id: String,
        kind: DatasetKind,
        filter: FilterExpr,
        grouping: Option<Grouping>,
        projection: Vec<Column>,
        sort: Option<SortSpec>,
    ) -> Self {
        Self {
            dataset_id,
            kind,
            filter,
            grouping,
            projection,
            sort,
        }
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn filter(&self) -> &FilterExpr {
        &self.filter
    }

    pub fn grouping(&self) -> Option<&Grouping> {
        self.grouping.as_ref()
    }

    /// Group keys; empty for simple plans
    pub fn group_keys(&self) -> &[Key] {
        self.grouping.as_ref().map(|g| g.keys.as_slice()).unwrap_or(&[])
    }

    /// Aggregations; empty for simple plans
    pub fn aggregations(&self) -> &[Aggregation] {
        self.grouping
            .as_ref()
            .map(|g| g.aggregations.as_slice())
            .unwrap_or(&[])
    }

    pub fn projection(&self) -> &[Column] {
        &self.projection
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// Output column names in projection order
    pub fn columns(&self) -> Vec<String> {
        self.projection.iter().map(Column::name).collect()
    }
}

/// An owned output value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl From<FieldRef<'_>> for FieldValue {
    fn from(value: FieldRef<'_>) -> Self {
        match value {
            FieldRef::Number(n) => Self::Number(n),
            FieldRef::Text(s) => Self::Text(s.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Largest magnitude an f64 holds as an exact integer
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INT => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// One output row: column name to value, in projection order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    values: Vec<(String, FieldValue)>,
}

impl ResultRow {
    pub(crate) fn push(&mut self, column: String, value: FieldValue) {
        self.values.push((column, value));
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
