//! In-memory [`RecordStore`] used in place of SQLite by the service tests.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use crate::fields::{ChangeSet, FieldValue};
use crate::store::{check_change_columns, Filter, Order, Record, RecordId, RecordStore, StoreError, StoreResult, CREATED_AT, ID, UPDATED_AT};
use crate::timestamp::Timestamp;

type Row = BTreeMap<String, FieldValue>;

#[derive(Default)]
struct Tables {
    next_id: RecordId,
    rows: BTreeMap<&'static str, BTreeMap<RecordId, Row>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Corrupted { table: "*", reason: e.to_string() }
}

fn materialize<T: Record>(row: &Row) -> StoreResult<T> {
    let object = row.iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect::<serde_json::Map<_, _>>();
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| StoreError::Corrupted { table: T::TABLE, reason: e.to_string() })
}

fn compare(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    match (a, b) {
        (Some(FieldValue::Integer(a)), Some(FieldValue::Integer(b))) => a.cmp(b),
        (Some(FieldValue::Decimal(a)), Some(FieldValue::Decimal(b))) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Some(FieldValue::Text(a)), Some(FieldValue::Text(b))) => a.cmp(b),
        (Some(FieldValue::Timestamp(a)), Some(FieldValue::Timestamp(b))) => a.cmp(b),
        (Some(FieldValue::Date(a)), Some(FieldValue::Date(b))) => a.cmp(b),
        // NULLs first, like SQLite
        (None | Some(FieldValue::Null), None | Some(FieldValue::Null)) => Ordering::Equal,
        (None | Some(FieldValue::Null), _) => Ordering::Less,
        (_, None | Some(FieldValue::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert_count(&self) -> usize {
        self.inserts.load(AtomicOrdering::SeqCst)
    }
    pub fn update_count(&self) -> usize {
        self.updates.load(AtomicOrdering::SeqCst)
    }
}

// lock guards never live inside the async methods
impl MemoryStore {
    fn get_now<T: Record>(&self, id: RecordId) -> StoreResult<Option<T>> {
        let tables = self.tables.read().map_err(poisoned)?;
        tables.rows.get(T::TABLE)
            .and_then(|rows| rows.get(&id))
            .map(materialize::<T>)
            .transpose()
    }

    fn find_now<T: Record>(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        filter.check_columns::<T>()?;
        let tables = self.tables.read().map_err(poisoned)?;
        let Some(rows) = tables.rows.get(T::TABLE) else {
            return Ok(vec![]);
        };
        let mut matching = rows.values()
            .filter(|row| filter.conditions.iter().all(|(column, value)| {
                match row.get(column) {
                    Some(v) => v == value,
                    None => value.is_null(),
                }
            }))
            .collect::<Vec<_>>();
        match &filter.order {
            Some(Order::Asc(column)) => matching.sort_by(|a, b| compare(a.get(*column), b.get(*column))),
            Some(Order::Desc(column)) => matching.sort_by(|a, b| compare(b.get(*column), a.get(*column))),
            None => {}
        }
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        matching.into_iter()
            .skip(offset)
            .take(limit)
            .map(materialize::<T>)
            .collect()
    }

    fn insert_now<T: Record>(&self, fields: &ChangeSet) -> StoreResult<T> {
        check_change_columns::<T>(fields)?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.next_id += 1;
        let id = tables.next_id;
        let now = Timestamp::now();
        let mut row: Row = T::FIELDS.iter()
            .filter(|f| f.nullable)
            .map(|f| (f.name.to_string(), FieldValue::Null))
            .collect();
        for (name, value) in fields.iter() {
            row.insert(name.to_string(), value.clone());
        }
        row.insert(ID.to_string(), FieldValue::Integer(id));
        row.insert(CREATED_AT.to_string(), FieldValue::Timestamp(now));
        row.insert(UPDATED_AT.to_string(), FieldValue::Timestamp(now));
        let rec = materialize::<T>(&row)?;
        tables.rows.entry(T::TABLE).or_default().insert(id, row);
        self.inserts.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(rec)
    }

    fn update_now<T: Record>(&self, id: RecordId, fields: &ChangeSet) -> StoreResult<T> {
        check_change_columns::<T>(fields)?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let row = tables.rows.get_mut(T::TABLE)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or(StoreError::NotFound { label: T::LABEL, id })?;
        let mut merged = row.clone();
        for (name, value) in fields.iter() {
            merged.insert(name.to_string(), value.clone());
        }
        merged.insert(UPDATED_AT.to_string(), FieldValue::Timestamp(Timestamp::now()));
        let rec = materialize::<T>(&merged)?;
        *row = merged;
        self.updates.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(rec)
    }

    fn delete_now<T: Record>(&self, id: RecordId) -> StoreResult<bool> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        Ok(tables.rows.get_mut(T::TABLE)
            .map(|rows| rows.remove(&id).is_some())
            .unwrap_or(false))
    }
}

#[rocket::async_trait]
impl RecordStore for MemoryStore {
    async fn get<T: Record>(&self, id: RecordId) -> StoreResult<Option<T>> {
        self.get_now(id)
    }
    async fn find<T: Record>(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        self.find_now(filter)
    }
    async fn insert<T: Record>(&self, fields: &ChangeSet) -> StoreResult<T> {
        self.insert_now(fields)
    }
    async fn update<T: Record>(&self, id: RecordId, fields: &ChangeSet) -> StoreResult<T> {
        self.update_now(id, fields)
    }
    async fn delete<T: Record>(&self, id: RecordId) -> StoreResult<bool> {
        self.delete_now::<T>(id)
    }
}
