use std::fmt::{Display, Formatter};
use std::str::FromStr;
use anyhow::anyhow;
use rocket::{Build, Rocket, State};
use rocket::response::status::Custom;
use rocket::serde::json::{self, Json};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use studiohttpd_proc_macros::Patch;
use crate::AppConfig;
use crate::aggregate::{aggregate, Summary};
use crate::decimal::Decimal;
use crate::error::{ServiceError, ServiceResult};
use crate::fields::{non_null, present, ChangeSet, FieldDef, FieldKind, FieldValue, Patch};
use crate::impl_sqlx_text_type_encode_decode;
use crate::mutation;
use crate::sqlite_store::SqliteStore;
use crate::store::{Filter, Order, Record, RecordId};
use crate::timestamp::Timestamp;
use crate::util::{json_to_custom_error, service_to_custom_error};
use crate::validation::{max_len, non_empty, non_negative};

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Copy)]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}
impl Level {
    pub const NAMES: &'static [&'static str] = &["Beginner", "Intermediate", "Advanced"];
}
impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Beginner => f.write_str("Beginner"),
            Level::Intermediate => f.write_str("Intermediate"),
            Level::Advanced => f.write_str("Advanced"),
        }
    }
}
impl FromStr for Level {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            stringify!(Beginner) => Ok(Self::Beginner),
            stringify!(Intermediate) => Ok(Self::Intermediate),
            stringify!(Advanced) => Ok(Self::Advanced),
            _ => Err(anyhow!("Unknown level: {s}")),
        }
    }
}
impl_sqlx_text_type_encode_decode!(Level);
impl From<Level> for FieldValue {
    fn from(value: Level) -> Self {
        FieldValue::Text(value.to_string())
    }
}

#[derive(Serialize, Deserialize, FromRow, PartialEq, Clone, Debug)]
pub struct Course {
    pub id: RecordId,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub level: Level,
    pub price: Decimal,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
impl Record for Course {
    const TABLE: &'static str = "courses";
    const LABEL: &'static str = "Course";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::unique("code", FieldKind::Text),
        FieldDef::required("title", FieldKind::Text),
        FieldDef::nullable("description", FieldKind::Text),
        FieldDef::required("level", FieldKind::Enum(Level::NAMES)),
        FieldDef::required("price", FieldKind::Decimal),
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
pub struct NewCourse {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub level: Level,
    pub price: Decimal,
}
impl NewCourse {
    pub fn validate(&self) -> ServiceResult<()> {
        non_empty("code", &self.code)?;
        max_len("code", &self.code, 32)?;
        non_empty("title", &self.title)?;
        non_negative("price", self.price.value())
    }
    pub fn fields(&self) -> ChangeSet {
        ChangeSet::new()
            .with("code", self.code.trim())
            .with("title", self.title.as_str())
            .with("description", self.description.clone())
            .with("level", self.level)
            .with("price", self.price)
    }
}

#[derive(Serialize, Deserialize, Patch, Default, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct CoursePatch {
    #[serde(default, deserialize_with = "non_null")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null")]
    pub level: Option<Level>,
    #[serde(default, deserialize_with = "non_null")]
    pub price: Option<Decimal>,
}
impl CoursePatch {
    pub fn validate(&self) -> ServiceResult<()> {
        if let Some(code) = &self.code {
            non_empty("code", code)?;
            max_len("code", code, 32)?;
        }
        if let Some(title) = &self.title {
            non_empty("title", title)?;
        }
        if let Some(price) = self.price {
            non_negative("price", price.value())?;
        }
        Ok(())
    }
    fn normalized(mut self) -> Self {
        self.code = self.code.map(|c| c.trim().to_string());
        self
    }
}

fn parse_level(level: Option<&str>) -> ServiceResult<Option<Level>> {
    level.map(|s| s.parse::<Level>().map_err(|e| ServiceError::validation(e.to_string())))
        .transpose()
}

#[post("/api/courses", data = "<course>")]
async fn post_course(course: Result<Json<NewCourse>, json::Error<'_>>, store: &State<SqliteStore>) -> Result<Json<Course>, Custom<String>> {
    let course = course.map_err(json_to_custom_error)?;
    course.validate().map_err(service_to_custom_error)?;
    let rec = mutation::create::<Course, _>(store.inner(), &course.fields()).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[get("/api/courses?<level>&<limit>&<offset>")]
async fn get_courses(level: Option<&str>, limit: Option<u32>, offset: Option<u32>, cfg: &State<AppConfig>, store: &State<SqliteStore>) -> Result<Json<Vec<Course>>, Custom<String>> {
    let level = parse_level(level).map_err(service_to_custom_error)?;
    let (limit, offset) = cfg.page(limit, offset);
    let filter = Filter::new()
        .eq_opt("level", level)
        .order_by(Order::Asc("code"))
        .page(limit, offset);
    let recs = mutation::list::<Course, _>(store.inner(), &filter).await.map_err(service_to_custom_error)?;
    Ok(Json(recs))
}

#[get("/api/courses/summary?<level>")]
async fn get_courses_summary(level: Option<&str>, store: &State<SqliteStore>) -> Result<Json<Summary>, Custom<String>> {
    let level = parse_level(level).map_err(service_to_custom_error)?;
    let recs = mutation::list::<Course, _>(store.inner(), &Filter::new().eq_opt("level", level)).await.map_err(service_to_custom_error)?;
    Ok(Json(aggregate(&recs, |c| c.price.value())))
}

#[get("/api/courses/<id>")]
async fn get_course(id: RecordId, store: &State<SqliteStore>) -> Result<Json<Course>, Custom<String>> {
    let rec = mutation::get::<Course, _>(store.inner(), id).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[patch("/api/courses/<id>", data = "<patch>")]
async fn patch_course(id: RecordId, patch: Result<Json<CoursePatch>, json::Error<'_>>, store: &State<SqliteStore>) -> Result<Json<Course>, Custom<String>> {
    let patch = patch.map_err(json_to_custom_error)?;
    patch.validate().map_err(service_to_custom_error)?;
    let changes = patch.into_inner().normalized().changes();
    let rec = mutation::partial_update::<Course, _>(store.inner(), id, &changes).await.map_err(service_to_custom_error)?;
    Ok(Json(rec))
}

#[delete("/api/courses/<id>")]
async fn delete_course(id: RecordId, store: &State<SqliteStore>) -> Result<(), Custom<String>> {
    mutation::delete::<Course, _>(store.inner(), id).await.map_err(service_to_custom_error)
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
        post_course,
        get_courses,
        get_courses_summary,
        get_course,
        patch_course,
        delete_course,
    ])
}
