use std::backtrace::Backtrace;
use log::{debug, error, warn};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json;
use serde_json::error::Category;
use crate::error::ServiceError;

pub(crate) fn error_status(err: &ServiceError) -> Status {
    match err {
        ServiceError::Validation(_) => Status::UnprocessableEntity,
        ServiceError::NotFound { .. } => Status::NotFound,
        ServiceError::InvalidRange { .. } => Status::BadRequest,
        ServiceError::Conflict { .. } => Status::Conflict,
        ServiceError::SchedulingConflict { .. } => Status::Conflict,
        ServiceError::StoreFailure(_) => Status::InternalServerError,
    }
}
pub(crate) fn service_to_custom_error(err: ServiceError) -> Custom<String> {
    let status = error_status(&err);
    match status.class() {
        rocket::http::StatusClass::ServerError => error!("Error: {err}\nbacktrace: {}", Backtrace::capture()),
        _ if matches!(err, ServiceError::NotFound { .. }) => debug!("{err}"),
        _ => warn!("Request rejected: {err}"),
    }
    Custom(status, err.to_string())
}
// a body that is valid JSON but not a valid payload is a validation failure
pub(crate) fn json_to_custom_error(err: json::Error<'_>) -> Custom<String> {
    match err {
        json::Error::Parse(_, e) if e.classify() == Category::Data => service_to_custom_error(ServiceError::validation(e.to_string())),
        err => {
            warn!("Request body rejected: {err}");
            Custom(Status::BadRequest, err.to_string())
        }
    }
}
pub(crate) fn anyhow_to_custom_error(err: anyhow::Error) -> Custom<String> {
    error!("Error: {err}\nbacktrace: {}", Backtrace::capture());
    Custom(Status::InternalServerError, format!("Error: {}", err))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::timestamp::Timestamp;

    #[test]
    fn test_status_and_message() {
        let err = ServiceError::NotFound { label: "Instructor", id: 7 };
        let resp = service_to_custom_error(err);
        assert_eq!(resp.0, Status::NotFound);
        assert_eq!(resp.1, "Instructor not found (id=7)");

        let start = Timestamp::from_iso_string("2024-01-15T08:00:00Z").unwrap();
        let end = Timestamp::from_iso_string("2024-01-15T09:00:00Z").unwrap();
        let resp = service_to_custom_error(ServiceError::SchedulingConflict { id: 1, start, end });
        assert_eq!(resp.0, Status::Conflict);
        assert_eq!(resp.1, "Scheduling conflict with session id=1 [2024-01-15T08:00:00Z, 2024-01-15T09:00:00Z)");

        let resp = service_to_custom_error(ServiceError::InvalidRange { start: end, end: start });
        assert_eq!(resp.0, Status::BadRequest);
    }

    #[test]
    fn test_json_rejections() {
        let e = serde_json::from_str::<String>("null").unwrap_err();
        let resp = json_to_custom_error(json::Error::Parse("null", e));
        assert_eq!(resp.0, Status::UnprocessableEntity);
        assert!(resp.1.starts_with("invalid type: null"), "{}", resp.1);

        let e = serde_json::from_str::<String>("\"Ann").unwrap_err();
        let resp = json_to_custom_error(json::Error::Parse("\"Ann", e));
        assert_eq!(resp.0, Status::BadRequest);
    }
}
