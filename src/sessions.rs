use rocket::{Build, Rocket, State};
use rocket::response::status::Custom;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studiohttpd_proc_macros::Patch;
use crate::AppConfig;
use crate::courses::Course;
use crate::decimal::Decimal;
use crate::error::ServiceResult;
use crate::fields::{non_null, present, ChangeSet, FieldDef, FieldKind, Patch};
use crate::instructors::Instructor;
use crate::mutation;
use crate::scheduling::{check_and_insert, check_and_update, check_range, IntervalRecord};
use crate::sqlite_store::SqliteStore;
use crate::store::{Filter, Order, Record, RecordId, RecordStore};
use crate::timestamp::Timestamp;
use crate::util::{json_to_custom_error, service_to_custom_error};
use crate::validation::{max_len, non_negative, positive_id};

#[derive(Serialize, Deserialize, FromRow, PartialEq, Clone, Debug)]
pub struct ClassSession {
    pub id: RecordId,
    pub instructor_id: RecordId,
    pub course_id: Option<RecordId>,
    pub room: Option<String>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub fee: Decimal,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
impl Record for ClassSession {
    const TABLE: &'static str = "class_sessions";
    const LABEL: &'static str = "Session";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::required("instructor_id", FieldKind::Integer),
        FieldDef::nullable("course_id", FieldKind::Integer),
        FieldDef::nullable("room", FieldKind::Text),
        FieldDef::required("start_time", FieldKind::Timestamp),
        FieldDef::required("end_time", FieldKind::Timestamp),
        FieldDef::required("fee", FieldKind::Decimal),
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
impl IntervalRecord for ClassSession {
    type Owner = Instructor;
    const OWNER_FIELD: &'static str = "instructor_id";
    const START_FIELD: &'static str = "start_time";
    const END_FIELD: &'static str = "end_time";

    fn owner_id(&self) -> RecordId {
        self.instructor_id
    }
    fn start(&self) -> Timestamp {
        self.start_time
    }
    fn end(&self) -> Timestamp {
        self.end_time
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct NewSession {
    pub instructor_id: RecordId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    #[serde(default)]
    pub course_id: Option<RecordId>,
    #[serde(default)]
    pub room: Option<String>,
    pub fee: Decimal,
}
impl NewSession {
    pub fn validate(&self) -> ServiceResult<()> {
        positive_id("instructor_id", self.instructor_id)?;
        if let Some(course_id) = self.course_id {
            positive_id("course_id", course_id)?;
        }
        if let Some(room) = &self.room {
            max_len("room", room, 50)?;
        }
        non_negative("fee", self.fee.value())
    }
    fn other_fields(&self) -> ChangeSet {
        ChangeSet::new()
            .with("course_id", self.course_id)
            .with("room", self.room.clone())
            .with("fee", self.fee)
    }
}

#[derive(Serialize, Deserialize, Patch, Default, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct SessionPatch {
    #[serde(default, deserialize_with = "non_null")]
    pub instructor_id: Option<RecordId>,
    #[serde(default, deserialize_with = "present")]
    pub course_id: Option<Option<RecordId>>,
    #[serde(default, deserialize_with = "present")]
    pub room: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null")]
    pub start_time: Option<Timestamp>,
    #[serde(default, deserialize_with = "non_null")]
    pub end_time: Option<Timestamp>,
    #[serde(default, deserialize_with = "non_null")]
    pub fee: Option<Decimal>,
}
impl SessionPatch {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(id) = self.instructor_id {
            positive_id("instructor_id", id)?;
        }
        if let Some(Some(id)) = self.course_id {
            positive_id("course_id", id)?;
        }
        if let Some(Some(room)) = &self.room {
            max_len("room", room, 50)?;
        }
        if let Some(fee) = self.fee {
            non_negative("fee", fee.value())?;
        }
        Ok(())
    }
}

/// Books a session for its instructor, refusing overlaps with the instructor's other sessions.
pub async fn create_session<S: RecordStore>(store: &S, new: &NewSession) -> ServiceResult<ClassSession> {
    check_range(new.start_time, new.end_time)?;
    if let Some(course_id) = new.course_id {
        mutation::get::<Course, S>(store, course_id).await?;
    }
    check_and_insert(store, new.instructor_id, new.start_time, new.end_time, new.other_fields()).await
}

pub async fn update_session<S: RecordStore>(store: &S, id: RecordId, patch: &SessionPatch) -> ServiceResult<ClassSession> {
    mutation::get::<ClassSession, S>(store, id).await?;
    if let Some(Some(course_id)) = patch.course_id {
        mutation::get::<Course, S>(store, course_id).await?;
    }
    check_and_update(store, id, &patch.changes()).await
}

#[post("/api/sessions", data = "<session>")]
async fn post_session(session: Result<Json<NewSession>, json::Error<'_>>, store: &State<SqliteStore>) -> Result<Json<ClassSession>, Custom<String>> {
    let session = session.map_err(json_to_custom_error)?;
    session.validate().map_err(service_to_custom_error)?;
    let rec = create_session(store.inner(), &session).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[get("/api/sessions?<instructor_id>&<course_id>&<latest_first>&<limit>&<offset>")]
async fn get_sessions(instructor_id: Option<RecordId>, course_id: Option<RecordId>, latest_first: Option<bool>, limit: Option<u32>, offset: Option<u32>, cfg: &State<AppConfig>, store: &State<SqliteStore>) -> Result<Json<Vec<ClassSession>>, Custom<String>> {
    let (limit, offset) = cfg.page(limit, offset);
    let order = if latest_first.unwrap_or(false) {
        Order::Desc("start_time")
    } else {
        Order::Asc("start_time")
    };
    let filter = Filter::new()
        .eq_opt("instructor_id", instructor_id)
        .eq_opt("course_id", course_id)
        .order_by(order)
        .page(limit, offset);
    let recs = mutation::list::<ClassSession, _>(store.inner(), &filter).await.map_err(service_to_custom_error)?;
    Ok(Json(recs))
}

#[get("/api/sessions/<id>")]
async fn get_session(id: RecordId, store: &State<SqliteStore>) -> Result<Json<ClassSession>, Custom<String>> {
    let rec = mutation::get::<ClassSession, _>(store.inner(), id).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[patch("/api/sessions/<id>", data = "<patch>")]
async fn patch_session(id: RecordId, patch: Result<Json<SessionPatch>, json::Error<'_>>, store: &State<SqliteStore>) -> Result<Json<ClassSession>, Custom<String>> {
    let patch = patch.map_err(json_to_custom_error)?;
    patch.validate().map_err(service_to_custom_error)?;
    let rec = update_session(store.inner(), id, &patch).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[delete("/api/sessions/<id>")]
async fn delete_session(id: RecordId, store: &State<SqliteStore>) -> Result<(), Custom<String>> {
    mutation::delete::<ClassSession, _>(store.inner(), id).await.map_err(service_to_custom_error)
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
        post_session,
        get_sessions,
        get_session,
        patch_session,
        delete_session,
    ])
}
