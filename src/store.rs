use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::FromRow;
use sqlx::sqlite::SqliteRow;
use crate::fields::{ChangeSet, FieldDef, FieldValue};
use crate::timestamp::Timestamp;

pub type RecordId = i64;

/// Columns every record table carries next to its declared fields.
pub const ID: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Row type of one table.
pub trait Record:
    Serialize + DeserializeOwned + for<'r> FromRow<'r, SqliteRow> + Clone + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;
    /// Human readable name used in error messages.
    const LABEL: &'static str;
    /// Mutable columns, `id`, `created_at` and `updated_at` excluded.
    const FIELDS: &'static [FieldDef];

    fn id(&self) -> RecordId;
    fn created_at(&self) -> Timestamp;
    fn updated_at(&self) -> Timestamp;

    fn field_def(name: &str) -> Option<&'static FieldDef> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }
    fn is_column(name: &str) -> bool {
        name == ID || name == CREATED_AT || name == UPDATED_AT || Self::field_def(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Asc(&'static str),
    Desc(&'static str),
}

/// Equality-filtered lookup, optionally ordered and paged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<(String, FieldValue)>,
    pub order: Option<Order>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
impl Filter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn eq(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
        self.conditions.push((column.to_string(), value.into()));
        self
    }
    /// Adds the condition only when a value is given.
    pub fn eq_opt<T: Into<FieldValue>>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }
    pub fn order_by(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }
    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
    pub(crate) fn check_columns<T: Record>(&self) -> Result<(), StoreError> {
        let ordered = match &self.order {
            Some(Order::Asc(col)) | Some(Order::Desc(col)) => Some(*col),
            None => None,
        };
        for column in self.conditions.iter().map(|(c, _)| c.as_str()).chain(ordered) {
            if !T::is_column(column) {
                return Err(StoreError::UnknownColumn { table: T::TABLE, column: column.to_string() });
            }
        }
        Ok(())
    }
}

pub(crate) fn check_change_columns<T: Record>(changes: &ChangeSet) -> Result<(), StoreError> {
    for name in changes.changed_fields() {
        if T::field_def(name).is_none() {
            return Err(StoreError::UnknownColumn { table: T::TABLE, column: name.to_string() });
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{label} not found (id={id})")]
    NotFound { label: &'static str, id: RecordId },
    #[error("{label} with {column} '{value}' already exists")]
    Duplicate { label: &'static str, column: String, value: String },
    #[error("Unknown column {table}.{column}")]
    UnknownColumn { table: &'static str, column: String },
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Corrupted row in {table}: {reason}")]
    Corrupted { table: &'static str, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of records keyed by `id`.
///
/// Every call is a single round trip, nothing is held between calls.
#[rocket::async_trait]
pub trait RecordStore: Send + Sync {
    async fn get<T: Record>(&self, id: RecordId) -> StoreResult<Option<T>>;
    async fn find<T: Record>(&self, filter: &Filter) -> StoreResult<Vec<T>>;
    /// Assigns `id`, `created_at` and `updated_at`.
    async fn insert<T: Record>(&self, fields: &ChangeSet) -> StoreResult<T>;
    /// Writes only the listed columns and refreshes `updated_at`.
    async fn update<T: Record>(&self, id: RecordId, fields: &ChangeSet) -> StoreResult<T>;
    async fn delete<T: Record>(&self, id: RecordId) -> StoreResult<bool>;
}
