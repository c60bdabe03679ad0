use itertools::Itertools;
use log::debug;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use crate::fields::{ChangeSet, FieldValue};
use crate::store::{check_change_columns, Filter, Order, Record, RecordId, RecordStore, StoreError, StoreResult, CREATED_AT, UPDATED_AT};
use crate::timestamp::Timestamp;

pub struct SqliteStore {
    pool: SqlitePool,
}
impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn push_value(q: &mut QueryBuilder<'_, Sqlite>, value: &FieldValue) {
    match value {
        FieldValue::Null => { q.push_bind(None::<String>); }
        FieldValue::Integer(n) => { q.push_bind(*n); }
        FieldValue::Decimal(d) => { q.push_bind(*d); }
        FieldValue::Text(s) => { q.push_bind(s.clone()); }
        FieldValue::Timestamp(ts) => { q.push_bind(*ts); }
        FieldValue::Date(d) => { q.push_bind(*d); }
    }
}

// a row that cannot be decoded into its record type
fn row_error<T: Record>(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::Corrupted {
            table: T::TABLE,
            reason: err.to_string(),
        },
        err => StoreError::Sql(err),
    }
}

// sqlite reports "UNIQUE constraint failed: <table>.<column>"
fn write_error<T: Record>(err: sqlx::Error, fields: &ChangeSet) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            let column = db_err.message().rsplit('.').next().unwrap_or_default().to_string();
            let value = fields.get(&column).map(FieldValue::to_string).unwrap_or_default();
            StoreError::Duplicate { label: T::LABEL, column, value }
        }
        err => row_error::<T>(err),
    }
}

#[rocket::async_trait]
impl RecordStore for SqliteStore {
    async fn get<T: Record>(&self, id: RecordId) -> StoreResult<Option<T>> {
        let qs = format!("SELECT * FROM {} WHERE id=?", T::TABLE);
        let rec = sqlx::query_as::<_, T>(&qs)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(row_error::<T>)?;
        Ok(rec)
    }

    async fn find<T: Record>(&self, filter: &Filter) -> StoreResult<Vec<T>> {
        filter.check_columns::<T>()?;
        let mut q = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", T::TABLE));
        for (n, (column, value)) in filter.conditions.iter().enumerate() {
            q.push(if n == 0 { " WHERE " } else { " AND " });
            if value.is_null() {
                q.push(format!("{column} IS NULL"));
            } else {
                q.push(format!("{column}="));
                push_value(&mut q, value);
            }
        }
        match &filter.order {
            Some(Order::Asc(column)) => { q.push(format!(" ORDER BY {column} ASC, id ASC")); }
            Some(Order::Desc(column)) => { q.push(format!(" ORDER BY {column} DESC, id DESC")); }
            None => { q.push(" ORDER BY id"); }
        }
        if filter.limit.is_some() || filter.offset.is_some() {
            q.push(" LIMIT ");
            q.push_bind(filter.limit.map(i64::from).unwrap_or(-1));
            q.push(" OFFSET ");
            q.push_bind(i64::from(filter.offset.unwrap_or(0)));
        }
        debug!("find: {}", q.sql());
        let recs = q.build_query_as::<T>().fetch_all(&self.pool).await.map_err(row_error::<T>)?;
        Ok(recs)
    }

    async fn insert<T: Record>(&self, fields: &ChangeSet) -> StoreResult<T> {
        check_change_columns::<T>(fields)?;
        let columns = fields.changed_fields().into_iter()
            .chain([CREATED_AT, UPDATED_AT])
            .join(", ");
        let mut q = QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} ({columns}) VALUES (", T::TABLE));
        for (_, value) in fields.iter() {
            push_value(&mut q, value);
            q.push(", ");
        }
        let now = Timestamp::now();
        q.push_bind(now);
        q.push(", ");
        q.push_bind(now);
        q.push(") RETURNING *");
        let rec = q.build_query_as::<T>()
            .fetch_one(&self.pool)
            .await
            .map_err(|err| write_error::<T>(err, fields))?;
        debug!("{} created, id: {}", T::LABEL, rec.id());
        Ok(rec)
    }

    async fn update<T: Record>(&self, id: RecordId, fields: &ChangeSet) -> StoreResult<T> {
        check_change_columns::<T>(fields)?;
        let mut q = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", T::TABLE));
        for (column, value) in fields.iter() {
            q.push(format!("{column}="));
            push_value(&mut q, value);
            q.push(", ");
        }
        q.push(format!("{UPDATED_AT}="));
        q.push_bind(Timestamp::now());
        q.push(" WHERE id=");
        q.push_bind(id);
        q.push(" RETURNING *");
        let rec = q.build_query_as::<T>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| write_error::<T>(err, fields))?
            .ok_or(StoreError::NotFound { label: T::LABEL, id })?;
        Ok(rec)
    }

    async fn delete<T: Record>(&self, id: RecordId) -> StoreResult<bool> {
        let qs = format!("DELETE FROM {} WHERE id=?", T::TABLE);
        let res = sqlx::query(&qs)
            .bind(id)
            .execute(&self.pool).await?;
        Ok(res.rows_affected() > 0)
    }
}
