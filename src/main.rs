#[macro_use] extern crate rocket;

use rocket::fairing::AdHoc;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use crate::db::DbPoolFairing;

#[cfg(test)]
mod memory_store;
mod aggregate;
mod courses;
mod db;
mod decimal;
mod demo;
mod error;
mod fields;
mod instructors;
mod mutation;
mod scheduling;
mod sessions;
mod sqlite_store;
mod store;
mod timestamp;
mod util;
mod validation;

fn default_page_limit() -> u32 {
    50
}
fn max_page_limit() -> u32 {
    500
}
fn demo_file() -> String {
    "demo/studio.yaml".to_string()
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u32,
    #[serde(default = "max_page_limit")]
    pub max_page_limit: u32,
    #[serde(default = "demo_file")]
    pub demo_file: String,
}
impl AppConfig {
    /// Effective `(limit, offset)` of a list request.
    pub fn page(&self, limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
        let limit = limit.unwrap_or(self.default_page_limit).min(self.max_page_limit);
        (limit, offset.unwrap_or(0))
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct ServiceInfo {
    name: String,
    version: String,
}

#[get("/")]
fn index() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[launch]
fn rocket() -> _ {
    let rocket = rocket::build()
        .attach(DbPoolFairing())
        .attach(AdHoc::config::<AppConfig>())
        .mount("/", routes![
            index,
        ]);
    let rocket = instructors::extend(rocket);
    let rocket = courses::extend(rocket);
    let rocket = sessions::extend(rocket);
    demo::extend(rocket)
}
