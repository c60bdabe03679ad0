use std::path::Path;
use std::str::FromStr;
use anyhow::Context;
use log::{error, info};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Build, Rocket};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::migrate::Migrator;
use crate::sqlite_store::SqliteStore;

// macro to encode and decode a Display + FromStr type as SQL text
#[macro_export]
macro_rules! impl_sqlx_text_type_encode_decode {
    ($type:ident) => {
        impl<DB: sqlx::Database> sqlx::Type<DB> for $type
        where str: sqlx::Type<DB>
        {
            fn type_info() -> <DB as sqlx::Database>::TypeInfo {
                // TEXT columns only
                <&str as sqlx::Type<DB>>::type_info()
            }
        }

        impl<'r, DB: sqlx::Database> sqlx::Decode<'r, DB> for $type
        where &'r str: sqlx::Decode<'r, DB>
        {
            fn decode(value: <DB as sqlx::Database>::ValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let value = <&str as sqlx::Decode<DB>>::decode(value)?;
                Ok(value.parse::<$type>()?)
            }
        }

        impl<'q, DB: sqlx::Database> sqlx::Encode<'q, DB> for $type
        where String: sqlx::Encode<'q, DB>
        {
            fn encode_by_ref(&self, buf: &mut <DB as sqlx::Database>::ArgumentBuffer<'q>) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<'q, DB>>::encode(self.to_string(), buf)
            }
        }
    };
}

static MIGRATOR: Migrator = sqlx::migrate!("db/migrations");

pub(crate) async fn open_pool(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid database url: {database_url}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        // every connection to sqlite::memory: is a separate database
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await
        .with_context(|| format!("Cannot open database: {database_url}"))?;
    MIGRATOR.run(&pool).await.context("Migration error")?;
    info!("Migrations applied successfully!");
    Ok(pool)
}

fn database_url(rocket: &Rocket<Build>) -> anyhow::Result<String> {
    if cfg!(test) {
        return Ok("sqlite::memory:".to_string());
    }
    let database_url = rocket.figment().extract_inner::<String>("database_url")
        .context("database_url is not configured")?;
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(dir) = Path::new(db_path).parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create database directory: {}", dir.to_string_lossy()))?;
        }
    }
    Ok(database_url)
}

pub struct DbPoolFairing();
#[rocket::async_trait]
impl Fairing for DbPoolFairing {
    fn info(&self) -> Info {
        Info {
            name: "SQLite Record Store with Migrations",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let database_url = match database_url(&rocket) {
            Ok(url) => url,
            Err(err) => {
                error!("Database configuration error: {err:?}");
                return Err(rocket);
            }
        };
        info!("Opening database: {database_url}");
        let max_connections = if cfg!(test) { 1 } else { 5 };
        match open_pool(&database_url, max_connections).await {
            Ok(pool) => Ok(rocket.manage(SqliteStore::new(pool))),
            Err(err) => {
                error!("Database error: {err:?}");
                Err(rocket)
            }
        }
    }
}
