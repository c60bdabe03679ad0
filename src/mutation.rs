//! Generic record mutations: create, partial update, delete and lookups.
//!
//! Every function takes the store as an explicit dependency and performs a short,
//! fixed sequence of store calls. Nothing is written unless all checks pass.

use log::{debug, info};
use crate::error::{ServiceError, ServiceResult};
use crate::fields::ChangeSet;
use crate::store::{Filter, Record, RecordId, RecordStore};
use crate::validation::{validate_changes, validate_new};

pub async fn get<T: Record, S: RecordStore>(store: &S, id: RecordId) -> ServiceResult<T> {
    store.get::<T>(id).await?
        .ok_or(ServiceError::NotFound { label: T::LABEL, id })
}

pub async fn list<T: Record, S: RecordStore>(store: &S, filter: &Filter) -> ServiceResult<Vec<T>> {
    Ok(store.find::<T>(filter).await?)
}

/// Fails with `Conflict` when a unique field in `changes` is already used by another record.
/// The record `own_id` itself never conflicts.
pub(crate) async fn check_unique<T: Record, S: RecordStore>(store: &S, changes: &ChangeSet, own_id: Option<RecordId>) -> ServiceResult<()> {
    for (name, value) in changes.iter() {
        let Some(def) = T::field_def(name) else { continue };
        if !def.unique || value.is_null() {
            continue;
        }
        let holders = store.find::<T>(&Filter::new().eq(name, value.clone())).await?;
        if holders.iter().any(|rec| Some(rec.id()) != own_id) {
            return Err(ServiceError::Conflict {
                label: T::LABEL,
                field: name.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

pub async fn create<T: Record, S: RecordStore>(store: &S, fields: &ChangeSet) -> ServiceResult<T> {
    validate_new::<T>(fields)?;
    check_unique::<T, S>(store, fields, None).await?;
    let rec = store.insert::<T>(fields).await?;
    info!("{} created, id: {}, at: {}", T::LABEL, rec.id(), rec.created_at());
    Ok(rec)
}

/// Applies only the fields present in `changes`, a null value clears the field.
///
/// The empty change set is valid and only refreshes `updated_at`.
/// Returns the complete record as persisted.
pub async fn partial_update<T: Record, S: RecordStore>(store: &S, id: RecordId, changes: &ChangeSet) -> ServiceResult<T> {
    validate_changes::<T>(changes)?;
    let current = get::<T, S>(store, id).await?;
    check_unique::<T, S>(store, changes, Some(current.id())).await?;
    if changes.is_empty() {
        debug!("{} id={id} touched", T::LABEL);
    } else {
        debug!("{} id={id} update, fields: {:?}", T::LABEL, changes.changed_fields());
    }
    let rec = store.update::<T>(id, changes).await?;
    debug!("{} id={id} updated at {}", T::LABEL, rec.updated_at());
    Ok(rec)
}

pub async fn delete<T: Record, S: RecordStore>(store: &S, id: RecordId) -> ServiceResult<()> {
    if store.delete::<T>(id).await? {
        info!("{} id={id} deleted", T::LABEL);
        Ok(())
    } else {
        Err(ServiceError::NotFound { label: T::LABEL, id })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::courses::{Course, Level};
    use crate::decimal::Decimal;
    use crate::fields::FieldValue;
    use crate::memory_store::MemoryStore;

    fn yoga() -> ChangeSet {
        ChangeSet::new()
            .with("code", "YOGA-1")
            .with("title", "A")
            .with("description", "d")
            .with("level", Level::Beginner)
            .with("price", Decimal(12.5))
    }

    #[rocket::async_test]
    async fn test_clear_with_null_then_empty_update() {
        let store = MemoryStore::new();
        let created: Course = create(&store, &yoga()).await.unwrap();
        assert_eq!(created.id, 1);

        let cleared: Course = partial_update(&store, 1, &ChangeSet::new().with("description", FieldValue::Null)).await.unwrap();
        assert_eq!(cleared.title, "A");
        assert_eq!(cleared.description, None);
        assert!(cleared.updated_at >= created.updated_at);
        assert_eq!(cleared.created_at, created.created_at);

        let touched: Course = partial_update(&store, 1, &ChangeSet::new()).await.unwrap();
        assert_eq!(touched.code, cleared.code);
        assert_eq!(touched.title, cleared.title);
        assert_eq!(touched.description, None);
        assert_eq!(touched.price, cleared.price);
        assert_eq!(touched.created_at, cleared.created_at);
        assert!(touched.updated_at >= cleared.updated_at);
    }

    #[rocket::async_test]
    async fn test_absent_field_is_untouched() {
        let store = MemoryStore::new();
        let _: Course = create(&store, &yoga()).await.unwrap();
        let rec: Course = partial_update(&store, 1, &ChangeSet::new().with("title", "B")).await.unwrap();
        assert_eq!(rec.title, "B");
        assert_eq!(rec.description.as_deref(), Some("d"));
        assert_eq!(rec.price, Decimal(12.5));
    }

    #[rocket::async_test]
    async fn test_update_with_own_values_is_identity() {
        let store = MemoryStore::new();
        let orig: Course = create(&store, &yoga()).await.unwrap();
        let rec: Course = partial_update(&store, orig.id, &yoga()).await.unwrap();
        assert_eq!(Course { updated_at: orig.updated_at, ..rec }, orig);
    }

    #[rocket::async_test]
    async fn test_update_missing_record() {
        let store = MemoryStore::new();
        let err = partial_update::<Course, _>(&store, 42, &ChangeSet::new().with("title", "B")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { id: 42, .. }));
        assert_eq!(err.to_string(), "Course not found (id=42)");
        assert_eq!(store.update_count(), 0);
    }

    #[rocket::async_test]
    async fn test_unique_conflict() {
        let store = MemoryStore::new();
        let _: Course = create(&store, &yoga()).await.unwrap();
        let err = create::<Course, _>(&store, &yoga()).await.unwrap_err();
        assert_eq!(err.to_string(), "Course with code 'YOGA-1' already exists");

        let other: Course = create(&store, &yoga().with("code", "YOGA-2")).await.unwrap();
        let err = partial_update::<Course, _>(&store, other.id, &ChangeSet::new().with("code", "YOGA-1")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict { .. }));
        // self update is fine
        let same: Course = partial_update(&store, other.id, &ChangeSet::new().with("code", "YOGA-2")).await.unwrap();
        assert_eq!(same.code, "YOGA-2");
    }

    #[rocket::async_test]
    async fn test_invalid_change_is_not_applied() {
        let store = MemoryStore::new();
        let _: Course = create(&store, &yoga()).await.unwrap();
        let err = partial_update::<Course, _>(&store, 1, &ChangeSet::new().with("title", FieldValue::Null)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let err = partial_update::<Course, _>(&store, 1, &ChangeSet::new().with("created_at", crate::timestamp::Timestamp::now())).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(store.update_count(), 0);
    }

    #[rocket::async_test]
    async fn test_delete() {
        let store = MemoryStore::new();
        let _: Course = create(&store, &yoga()).await.unwrap();
        delete::<Course, _>(&store, 1).await.unwrap();
        assert!(matches!(delete::<Course, _>(&store, 1).await, Err(ServiceError::NotFound { .. })));
        assert!(matches!(get::<Course, _>(&store, 1).await, Err(ServiceError::NotFound { .. })));
    }
}
