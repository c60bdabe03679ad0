use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;

/// Point in time, always kept in UTC with millisecond precision.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Hash)]
pub struct Timestamp(pub DateTime<FixedOffset>);
impl Timestamp {
    pub fn now() -> Self {
        Self::from_fixed_offset(Utc::now().fixed_offset())
    }
    pub fn from_fixed_offset(datetime: DateTime<FixedOffset>) -> Timestamp {
        let datetime = datetime.with_timezone(&Utc).fixed_offset();
        let millis = datetime.timestamp_subsec_millis();
        let nanos = datetime.timestamp_subsec_nanos() - millis * 1_000_000;
        if let Some(dt) = datetime.checked_sub_signed(TimeDelta::nanoseconds(nanos as i64)) {
            Timestamp(dt)
        } else {
            Timestamp(datetime)
        }
    }
    pub fn date_naive(&self) -> NaiveDate {
        self.0.date_naive()
    }
    pub fn to_iso_string(self) -> String {
        if self.0.timestamp_subsec_millis() == 0 {
            self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
        } else {
            self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
        }
    }
    // fixed width, so that TEXT ordering in SQL is chronological
    pub(crate) fn to_storage_string(self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
    pub fn from_iso_string(datetime_str: &str) -> Result<Self, anyhow::Error> {
        let dt = DateTime::parse_from_rfc3339(datetime_str)?;
        Ok(Self::from_fixed_offset(dt))
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::from_fixed_offset(value)
    }
}
impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso_string())
    }
}
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso_string())
    }
}
impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::from_iso_string(&s)
            .map_err(|e| serde::de::Error::custom(format!("Unrecognized date-time string: {s}, error: {e}")))
    }
}

impl<DB: sqlx::Database> sqlx::Type<DB> for Timestamp
where
    str: sqlx::Type<DB>,
{
    fn type_info() -> <DB as sqlx::Database>::TypeInfo {
        // TEXT columns only
        <&str as sqlx::Type<DB>>::type_info()
    }
}
impl<'r, DB: sqlx::Database> sqlx::Decode<'r, DB> for Timestamp
where
    &'r str: sqlx::Decode<'r, DB>,
{
    fn decode(value: <DB as sqlx::Database>::ValueRef<'r>) -> Result<Self, BoxDynError> {
        let value = <&str as sqlx::Decode<DB>>::decode(value)?;
        Ok(Timestamp::from_iso_string(value)?)
    }
}
impl<'q, DB: sqlx::Database> sqlx::Encode<'q, DB> for Timestamp
where
    String: sqlx::Encode<'q, DB>,
{
    fn encode_by_ref(&self, buf: &mut <DB as sqlx::Database>::ArgumentBuffer<'q>) -> Result<IsNull, BoxDynError> {
        <String as sqlx::Encode<'q, DB>>::encode(self.to_storage_string(), buf)
    }
}

#[test]
fn test_parse_timestamp() {
    for (dtstr, dtstr2) in &[
        ("1970-03-05 14:32:45+00:00", "1970-03-05T14:32:45Z"),
        ("2025-03-05T14:32:45Z", "2025-03-05T14:32:45Z"),
        ("2025-03-05 14:32:45+10:00", "2025-03-05T04:32:45Z"),
        ("2025-03-05T14:32:45-01:30", "2025-03-05T16:02:45Z"),
        ("2025-03-17T20:45:38.565293063+01:00", "2025-03-17T19:45:38.565Z"),
    ] {
        let dt = Timestamp::from_iso_string(dtstr)
            .map_err(|e| println!("parse {dtstr} error: {e}")).unwrap();
        assert_eq!(&dt.to_iso_string(), dtstr2)
    }
}

#[test]
fn test_storage_string_is_fixed_width() {
    let a = Timestamp::from_iso_string("2024-01-15T08:00:00Z").unwrap();
    let b = Timestamp::from_iso_string("2024-01-15T08:00:00.500Z").unwrap();
    assert_eq!(a.to_storage_string(), "2024-01-15T08:00:00.000Z");
    assert!(a.to_storage_string() < b.to_storage_string());
    assert!(a < b);
}

#[test]
fn test_offsets_compare_by_instant() {
    let a = Timestamp::from_iso_string("2024-01-15T09:00:00+01:00").unwrap();
    let b = Timestamp::from_iso_string("2024-01-15T08:00:00Z").unwrap();
    assert_eq!(a, b);
}
