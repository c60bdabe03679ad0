//! Owner-scoped interval conflict checks.
//!
//! Intervals are half-open, `[start, end)`: two intervals that only touch at an
//! endpoint do not overlap. Intervals of different owners never conflict.
//! The scan and the following insert/update are two separate store calls,
//! two concurrent requests for the same owner can both pass the scan.

use log::{debug, info};
use crate::error::{ServiceError, ServiceResult};
use crate::fields::{ChangeSet, FieldValue};
use crate::mutation::check_unique;
use crate::store::{Filter, Order, Record, RecordId, RecordStore};
use crate::timestamp::Timestamp;
use crate::validation::{validate_changes, validate_new};

/// Record that occupies a time interval on behalf of an owner record.
pub trait IntervalRecord: Record {
    type Owner: Record;
    const OWNER_FIELD: &'static str;
    const START_FIELD: &'static str;
    const END_FIELD: &'static str;

    fn owner_id(&self) -> RecordId;
    fn start(&self) -> Timestamp;
    fn end(&self) -> Timestamp;
}

pub fn overlaps(start: Timestamp, end: Timestamp, other_start: Timestamp, other_end: Timestamp) -> bool {
    start < other_end && end > other_start
}

pub fn check_range(start: Timestamp, end: Timestamp) -> ServiceResult<()> {
    if start < end {
        Ok(())
    } else {
        Err(ServiceError::InvalidRange { start, end })
    }
}

/// First interval in `existing` overlapping `[start, end)`, the record `skip` excluded.
pub fn find_conflict<T: IntervalRecord>(start: Timestamp, end: Timestamp, existing: &[T], skip: Option<RecordId>) -> Option<&T> {
    existing.iter()
        .filter(|rec| Some(rec.id()) != skip)
        .find(|rec| overlaps(start, end, rec.start(), rec.end()))
}

async fn require_owner<T: IntervalRecord, S: RecordStore>(store: &S, owner_id: RecordId) -> ServiceResult<()> {
    match store.get::<T::Owner>(owner_id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::NotFound { label: T::Owner::LABEL, id: owner_id }),
    }
}

async fn check_owner_intervals<T: IntervalRecord, S: RecordStore>(store: &S, owner_id: RecordId, start: Timestamp, end: Timestamp, skip: Option<RecordId>) -> ServiceResult<()> {
    let filter = Filter::new()
        .eq(T::OWNER_FIELD, owner_id)
        .order_by(Order::Asc(T::START_FIELD));
    let existing = store.find::<T>(&filter).await?;
    debug!("{} owner={owner_id}: checking [{start}, {end}) against {} intervals", T::LABEL, existing.len());
    if let Some(conflict) = find_conflict(start, end, &existing, skip) {
        return Err(ServiceError::SchedulingConflict {
            id: conflict.id(),
            start: conflict.start(),
            end: conflict.end(),
        });
    }
    Ok(())
}

/// Creates an interval record unless it overlaps another interval of the same owner.
pub async fn check_and_insert<T: IntervalRecord, S: RecordStore>(store: &S, owner_id: RecordId, start: Timestamp, end: Timestamp, other_fields: ChangeSet) -> ServiceResult<T> {
    check_range(start, end)?;
    let fields = other_fields
        .with(T::OWNER_FIELD, owner_id)
        .with(T::START_FIELD, start)
        .with(T::END_FIELD, end);
    validate_new::<T>(&fields)?;
    require_owner::<T, S>(store, owner_id).await?;
    check_owner_intervals::<T, S>(store, owner_id, start, end, None).await?;
    let rec = store.insert::<T>(&fields).await?;
    info!("{} created, id: {}, owner: {owner_id}, [{start}, {end})", T::LABEL, rec.id());
    Ok(rec)
}

fn changed_timestamp(changes: &ChangeSet, name: &str) -> ServiceResult<Option<Timestamp>> {
    match changes.get(name) {
        None => Ok(None),
        Some(FieldValue::Timestamp(ts)) => Ok(Some(*ts)),
        Some(value) => Err(ServiceError::validation(format!("Field '{name}' must be timestamp, got '{value}'"))),
    }
}
fn changed_id(changes: &ChangeSet, name: &str) -> ServiceResult<Option<RecordId>> {
    match changes.get(name) {
        None => Ok(None),
        Some(FieldValue::Integer(id)) => Ok(Some(*id)),
        Some(value) => Err(ServiceError::validation(format!("Field '{name}' must be integer, got '{value}'"))),
    }
}

/// Partial update of an interval record.
///
/// The merged interval (changed bounds and owner over the current ones) has to be
/// a valid range and must not overlap another interval of its owner.
pub async fn check_and_update<T: IntervalRecord, S: RecordStore>(store: &S, id: RecordId, changes: &ChangeSet) -> ServiceResult<T> {
    validate_changes::<T>(changes)?;
    let current = store.get::<T>(id).await?
        .ok_or(ServiceError::NotFound { label: T::LABEL, id })?;
    let owner_id = changed_id(changes, T::OWNER_FIELD)?.unwrap_or(current.owner_id());
    let start = changed_timestamp(changes, T::START_FIELD)?.unwrap_or(current.start());
    let end = changed_timestamp(changes, T::END_FIELD)?.unwrap_or(current.end());
    check_range(start, end)?;
    if owner_id != current.owner_id() {
        require_owner::<T, S>(store, owner_id).await?;
    }
    let moved = owner_id != current.owner_id() || start != current.start() || end != current.end();
    if moved {
        check_owner_intervals::<T, S>(store, owner_id, start, end, Some(id)).await?;
    }
    check_unique::<T, S>(store, changes, Some(id)).await?;
    let rec = store.update::<T>(id, changes).await?;
    if moved {
        info!("{} id={id} rescheduled, owner: {owner_id}, [{start}, {end})", T::LABEL);
    }
    Ok(rec)
}
