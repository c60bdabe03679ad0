use chrono::{NaiveDate, Utc};
use rocket::{Build, Rocket, State};
use rocket::response::status::Custom;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studiohttpd_proc_macros::Patch;
use crate::AppConfig;
use crate::aggregate::{aggregate, streak, Streak, Summary};
use crate::decimal::Decimal;
use crate::error::ServiceResult;
use crate::fields::{non_null, present, ChangeSet, FieldDef, FieldKind, Patch};
use crate::mutation;
use crate::sessions::ClassSession;
use crate::sqlite_store::SqliteStore;
use crate::store::{Filter, Order, Record, RecordId, RecordStore};
use crate::timestamp::Timestamp;
use crate::util::{json_to_custom_error, service_to_custom_error};
use crate::validation::{email, max_len, non_empty, non_negative};

#[derive(Serialize, Deserialize, FromRow, PartialEq, Clone, Debug)]
pub struct Instructor {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub hourly_rate: Decimal,
    pub hired_on: Option<NaiveDate>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
impl Record for Instructor {
    const TABLE: &'static str = "instructors";
    const LABEL: &'static str = "Instructor";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::required("name", FieldKind::Text),
        FieldDef::unique("email", FieldKind::Text),
        FieldDef::nullable("bio", FieldKind::Text),
        FieldDef::required("hourly_rate", FieldKind::Decimal),
        FieldDef::nullable("hired_on", FieldKind::Date),
    ];
    fn id(&self) -> RecordId {
        self.id
    }
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct NewInstructor {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub bio: Option<String>,
    pub hourly_rate: Decimal,
    #[serde(default)]
    pub hired_on: Option<NaiveDate>,
}
impl NewInstructor {
    pub fn validate(&self) -> ServiceResult<()> {
        non_empty("name", &self.name)?;
        max_len("name", &self.name, 100)?;
        email("email", self.email.trim())?;
        non_negative("hourly_rate", self.hourly_rate.value())
    }
    pub fn fields(&self) -> ChangeSet {
        ChangeSet::new()
            .with("name", self.name.trim())
            .with("email", self.email.trim().to_lowercase())
            .with("bio", self.bio.clone())
            .with("hourly_rate", self.hourly_rate)
            .with("hired_on", self.hired_on)
    }
}

#[derive(Serialize, Deserialize, Patch, Default, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct InstructorPatch {
    #[serde(default, deserialize_with = "non_null")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null")]
    pub hourly_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "present")]
    pub hired_on: Option<Option<NaiveDate>>,
}
impl InstructorPatch {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(name) = &self.name {
            non_empty("name", name)?;
            max_len("name", name, 100)?;
        }
        if let Some(addr) = &self.email {
            email("email", addr.trim())?;
        }
        if let Some(rate) = self.hourly_rate {
            non_negative("hourly_rate", rate.value())?;
        }
        Ok(())
    }
    fn normalized(mut self) -> Self {
        self.email = self.email.map(|e| e.trim().to_lowercase());
        self
    }
}

async fn instructor_sessions<S: RecordStore>(store: &S, id: RecordId) -> ServiceResult<Vec<ClassSession>> {
    mutation::get::<Instructor, S>(store, id).await?;
    let filter = Filter::new()
        .eq("instructor_id", id)
        .order_by(Order::Asc("start_time"));
    mutation::list::<ClassSession, S>(store, &filter).await
}

pub async fn sessions_summary<S: RecordStore>(store: &S, id: RecordId) -> ServiceResult<Summary> {
    let sessions = instructor_sessions(store, id).await?;
    Ok(aggregate(&sessions, |s| s.fee.value()))
}

pub async fn teaching_streak<S: RecordStore>(store: &S, id: RecordId, today: NaiveDate) -> ServiceResult<Streak> {
    let sessions = instructor_sessions(store, id).await?;
    Ok(streak(sessions.iter().map(|s| s.start_time.date_naive()), today))
}

#[post("/api/instructors", data = "<instructor>")]
async fn post_instructor(instructor: Result<Json<NewInstructor>, json::Error<'_>>, store: &State<SqliteStore>) -> Result<Json<Instructor>, Custom<String>> {
    let instructor = instructor.map_err(json_to_custom_error)?;
    instructor.validate().map_err(service_to_custom_error)?;
    let rec = mutation::create::<Instructor, _>(store.inner(), &instructor.fields()).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[get("/api/instructors?<limit>&<offset>")]
async fn get_instructors(limit: Option<u32>, offset: Option<u32>, cfg: &State<AppConfig>, store: &State<SqliteStore>) -> Result<Json<Vec<Instructor>>, Custom<String>> {
    let (limit, offset) = cfg.page(limit, offset);
    let filter = Filter::new()
        .order_by(Order::Asc("name"))
        .page(limit, offset);
    let recs = mutation::list::<Instructor, _>(store.inner(), &filter).await.map_err(service_to_custom_error)?;
    Ok(Json(recs))
}

#[get("/api/instructors/<id>")]
async fn get_instructor(id: RecordId, store: &State<SqliteStore>) -> Result<Json<Instructor>, Custom<String>> {
    let rec = mutation::get::<Instructor, _>(store.inner(), id).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[patch("/api/instructors/<id>", data = "<patch>")]
async fn patch_instructor(id: RecordId, patch: Result<Json<InstructorPatch>, json::Error<'_>>, store: &State<SqliteStore>) -> Result<Json<Instructor>, Custom<String>> {
    let patch = patch.map_err(json_to_custom_error)?;
    patch.validate().map_err(service_to_custom_error)?;
    let changes = patch.into_inner().normalized().changes();
    let rec = mutation::partial_update::<Instructor, _>(store.inner(), id, &changes).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[delete("/api/instructors/<id>")]
async fn delete_instructor(id: RecordId, store: &State<SqliteStore>) -> Result<(), Custom<String>> {
    mutation::delete::<Instructor, _>(store.inner(), id).await.map_err(service_to_custom_error)
}

#[get("/api/instructors/<id>/sessions/summary")]
async fn get_sessions_summary(id: RecordId, store: &State<SqliteStore>) -> Result<Json<Summary>, Custom<String>> {
    let summary = sessions_summary(store.inner(), id).await.map_err(service_to_custom_error)?;
    Ok(Json(summary))
}

#[get("/api/instructors/<id>/streak")]
async fn get_streak(id: RecordId, store: &State<SqliteStore>) -> Result<Json<Streak>, Custom<String>> {
    let today = Utc::now().date_naive();
    let streak = teaching_streak(store.inner(), id, today).await.map_err(service_to_custom_error)?;
    Ok(Json(streak))
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
        post_instructor,
        get_instructors,
        get_instructor,
        patch_instructor,
        delete_instructor,
        get_sessions_summary,
        get_streak,
    ])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory_store::MemoryStore;
    use crate::scheduling::check_and_insert;

    fn ts(s: &str) -> Timestamp {
        Timestamp::from_iso_string(s).unwrap()
    }

    async fn ann(store: &MemoryStore) -> Instructor {
        let new: NewInstructor = serde_json::from_str(r#"{"name": "Ann", "email": "Ann@Studio.org ", "hourly_rate": "30.00"}"#).unwrap();
        new.validate().unwrap();
        mutation::create(store, &new.fields()).await.unwrap()
    }

    #[rocket::async_test]
    async fn test_fee_summary() {
        let store = MemoryStore::new();
        let ann = ann(&store).await;
        assert_eq!(ann.email, "ann@studio.org");
        assert_eq!(sessions_summary(&store, ann.id).await.unwrap(), Summary { sum: 0.0, average: 0.0, count: 0 });
        for (h, fee) in [(8, 5.0), (10, 6.0), (12, 4.0)] {
            let start = ts(&format!("2024-01-15T{h:02}:00:00Z"));
            let end = ts(&format!("2024-01-15T{:02}:00:00Z", h + 1));
            let _: ClassSession = check_and_insert(&store, ann.id, start, end, ChangeSet::new().with("fee", Decimal(fee))).await.unwrap();
        }
        assert_eq!(sessions_summary(&store, ann.id).await.unwrap(), Summary { sum: 15.0, average: 5.0, count: 3 });
        assert!(sessions_summary(&store, 99).await.is_err());
    }

    #[rocket::async_test]
    async fn test_teaching_streak() {
        let store = MemoryStore::new();
        let ann = ann(&store).await;
        for day in ["2024-01-15", "2024-01-16", "2024-01-17", "2024-01-20"] {
            let start = ts(&format!("{day}T08:00:00Z"));
            let end = ts(&format!("{day}T09:00:00Z"));
            let _: ClassSession = check_and_insert(&store, ann.id, start, end, ChangeSet::new().with("fee", Decimal(1.0))).await.unwrap();
        }
        let today = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        let streak = teaching_streak(&store, ann.id, today).await.unwrap();
        assert_eq!(streak, Streak { current: 1, longest: 3, active_days: 4 });
    }

    #[rocket::async_test]
    async fn test_clear_bio_and_date() {
        let store = MemoryStore::new();
        let ann = ann(&store).await;
        let patch: InstructorPatch = serde_json::from_str(r#"{"bio": "Yoga instructor", "hired_on": "2020-09-01"}"#).unwrap();
        let rec: Instructor = mutation::partial_update(&store, ann.id, &patch.changes()).await.unwrap();
        assert_eq!(rec.bio.as_deref(), Some("Yoga instructor"));
        assert_eq!(rec.hired_on, NaiveDate::from_ymd_opt(2020, 9, 1));

        let patch: InstructorPatch = serde_json::from_str(r#"{"hired_on": null}"#).unwrap();
        let rec: Instructor = mutation::partial_update(&store, ann.id, &patch.changes()).await.unwrap();
        assert_eq!(rec.hired_on, None);
        assert_eq!(rec.bio.as_deref(), Some("Yoga instructor"));
    }
}
