use std::collections::HashMap;
use std::fs;
use anyhow::{anyhow, Context};
use log::info;
use rocket::{Build, Rocket, State};
use rocket::response::Redirect;
use rocket::response::status::Custom;
use serde::Deserialize;
use crate::AppConfig;
use crate::courses::{Course, NewCourse};
use crate::decimal::Decimal;
use crate::error::{ServiceError, ServiceResult};
use crate::instructors::{Instructor, NewInstructor};
use crate::mutation;
use crate::sessions::{create_session, NewSession};
use crate::sqlite_store::SqliteStore;
use crate::store::{Filter, RecordStore};
use crate::timestamp::Timestamp;
use crate::util::{anyhow_to_custom_error, service_to_custom_error};

#[derive(Deserialize, Debug)]
struct DemoSession {
    instructor: String,
    #[serde(default)]
    course: Option<String>,
    #[serde(default)]
    room: Option<String>,
    start_time: Timestamp,
    end_time: Timestamp,
    fee: Decimal,
}

#[derive(Deserialize, Debug)]
struct DemoStudio {
    #[serde(default)]
    instructors: Vec<NewInstructor>,
    #[serde(default)]
    courses: Vec<NewCourse>,
    #[serde(default)]
    sessions: Vec<DemoSession>,
}

#[derive(PartialEq, Debug)]
pub struct SeedCount {
    pub instructors: usize,
    pub courses: usize,
    pub sessions: usize,
}

fn load_demo_studio(content: &str) -> anyhow::Result<DemoStudio> {
    Ok(serde_yaml::from_str(content)?)
}
fn load_demo_file(file: &str) -> anyhow::Result<DemoStudio> {
    info!("Loading demo studio from file: {file}");
    let content = fs::read_to_string(file)
        .with_context(|| format!("Cannot read demo file: {file}"))?;
    load_demo_studio(&content)
}

async fn seed<S: RecordStore>(store: &S, studio: &DemoStudio) -> anyhow::Result<SeedCount> {
    let mut instructors = HashMap::new();
    for new in &studio.instructors {
        new.validate()?;
        let rec: Instructor = mutation::create(store, &new.fields()).await?;
        instructors.insert(rec.email.clone(), rec.id);
    }
    let mut courses = HashMap::new();
    for new in &studio.courses {
        new.validate()?;
        let rec: Course = mutation::create(store, &new.fields()).await?;
        courses.insert(rec.code.clone(), rec.id);
    }
    for session in &studio.sessions {
        let instructor_id = *instructors.get(&session.instructor.to_lowercase())
            .ok_or_else(|| anyhow!("Unknown demo instructor: {}", session.instructor))?;
        let course_id = session.course.as_ref()
            .map(|code| courses.get(code).copied().ok_or_else(|| anyhow!("Unknown demo course: {code}")))
            .transpose()?;
        let new = NewSession {
            instructor_id,
            start_time: session.start_time,
            end_time: session.end_time,
            course_id,
            room: session.room.clone(),
            fee: session.fee,
        };
        new.validate()?;
        create_session(store, &new).await?;
    }
    let count = SeedCount {
        instructors: instructors.len(),
        courses: courses.len(),
        sessions: studio.sessions.len(),
    };
    info!("Demo studio created: {count:?}");
    Ok(count)
}

// the demo must not be seeded twice
async fn ensure_empty<S: RecordStore>(store: &S) -> ServiceResult<()> {
    let first = mutation::list::<Instructor, S>(store, &Filter::new().page(1, 0)).await?;
    match first.first() {
        None => Ok(()),
        Some(rec) => Err(ServiceError::Conflict {
            label: "Instructor",
            field: "email".to_string(),
            value: rec.email.clone(),
        }),
    }
}

#[get("/demo/create")]
async fn get_demo_create(cfg: &State<AppConfig>, store: &State<SqliteStore>) -> Result<Redirect, Custom<String>> {
    ensure_empty(store.inner()).await.map_err(service_to_custom_error)?;
    let studio = load_demo_file(&cfg.demo_file).map_err(anyhow_to_custom_error)?;
    seed(store.inner(), &studio).await.map_err(anyhow_to_custom_error)?;
    Ok(Redirect::to("/api/sessions"))
}

pub fn extend(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket.mount("/", routes![
        get_demo_create,
    ])
}
