use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use crate::decimal::Decimal;
use crate::timestamp::Timestamp;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Timestamp,
    Date,
    Enum(&'static [&'static str]),
}

/// Declaration of one mutable column of a record table.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    pub unique: bool,
}
impl FieldDef {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, nullable: false, unique: false }
    }
    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, nullable: true, unique: false }
    }
    pub const fn unique(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, nullable: false, unique: true }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Timestamp(Timestamp),
    Date(NaiveDate),
}
impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
    pub fn matches_kind(&self, kind: FieldKind) -> bool {
        match (self, kind) {
            (FieldValue::Null, _) => true,
            (FieldValue::Integer(_), FieldKind::Integer) => true,
            (FieldValue::Decimal(_), FieldKind::Decimal) => true,
            (FieldValue::Text(_), FieldKind::Text) => true,
            (FieldValue::Text(s), FieldKind::Enum(variants)) => variants.contains(&s.as_str()),
            (FieldValue::Timestamp(_), FieldKind::Timestamp) => true,
            (FieldValue::Date(_), FieldKind::Date) => true,
            _ => false,
        }
    }
    /// JSON form matching how records serialize the same column.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::Integer(n) => serde_json::Value::from(*n),
            FieldValue::Decimal(d) => serde_json::Value::from(d.value()),
            FieldValue::Text(s) => serde_json::Value::from(s.as_str()),
            FieldValue::Timestamp(ts) => serde_json::Value::from(ts.to_iso_string()),
            FieldValue::Date(d) => serde_json::Value::from(d.format("%F").to_string()),
        }
    }
}
impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Decimal(d) => write!(f, "{d}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Timestamp(ts) => write!(f, "{ts}"),
            FieldValue::Date(d) => write!(f, "{}", d.format("%F")),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}
impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Decimal(value)
    }
}
impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}
impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}
impl From<Timestamp> for FieldValue {
    fn from(value: Timestamp) -> Self {
        FieldValue::Timestamp(value)
    }
}
impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}
impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// Sparse set of field changes.
///
/// A key that is present is applied, `FieldValue::Null` clears the column.
/// A key that is absent leaves the column untouched.
#[derive(PartialEq, Default, Debug, Clone)]
pub struct ChangeSet(BTreeMap<String, FieldValue>);
impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.0.insert(name.to_string(), value.into());
    }
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn changed_fields(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Payload that can be turned into a [`ChangeSet`], see `#[derive(Patch)]`.
pub trait Patch {
    fn changes(&self) -> ChangeSet;
}

/// Deserializer for `Option<Option<T>>` payload fields.
///
/// Use together with `#[serde(default)]`: a missing key stays `None`,
/// an explicit `null` becomes `Some(None)`.
pub fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Deserializer for `Option<T>` payload fields of non-nullable columns.
///
/// A missing key stays `None`, an explicit `null` is rejected.
pub fn non_null<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    match Option::<T>::deserialize(deserializer)? {
        Some(value) => Ok(Some(value)),
        None => Err(serde::de::Error::custom("field cannot be null")),
    }
}
