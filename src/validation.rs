//! Shape checks applied to incoming change sets before they reach the store.
//!
//! Everything here is pure, no store access.

use crate::error::{ServiceError, ServiceResult};
use crate::fields::{ChangeSet, FieldKind};
use crate::store::{Record, CREATED_AT, ID, UPDATED_AT};

fn kind_name(kind: FieldKind) -> String {
    match kind {
        FieldKind::Text => "text".to_string(),
        FieldKind::Integer => "integer".to_string(),
        FieldKind::Decimal => "decimal".to_string(),
        FieldKind::Timestamp => "timestamp".to_string(),
        FieldKind::Date => "date".to_string(),
        FieldKind::Enum(variants) => format!("one of {}", variants.join("|")),
    }
}

/// Checks a partial change set against the declared fields of `T`.
pub fn validate_changes<T: Record>(changes: &ChangeSet) -> ServiceResult<()> {
    for (name, value) in changes.iter() {
        if name == ID || name == CREATED_AT || name == UPDATED_AT {
            return Err(ServiceError::validation(format!("Field '{name}' is not mutable on {}", T::LABEL)));
        }
        let Some(def) = T::field_def(name) else {
            return Err(ServiceError::validation(format!("Unknown field '{name}' on {}", T::LABEL)));
        };
        if value.is_null() && !def.nullable {
            return Err(ServiceError::validation(format!("Field '{name}' of {} cannot be null", T::LABEL)));
        }
        if !value.matches_kind(def.kind) {
            return Err(ServiceError::validation(format!("Field '{name}' of {} must be {}, got '{value}'", T::LABEL, kind_name(def.kind))));
        }
    }
    Ok(())
}

/// Like [`validate_changes`], additionally every non-nullable field has to be present.
pub fn validate_new<T: Record>(fields: &ChangeSet) -> ServiceResult<()> {
    validate_changes::<T>(fields)?;
    if let Some(missing) = T::FIELDS.iter().find(|f| !f.nullable && !fields.contains(f.name)) {
        return Err(ServiceError::validation(format!("Field '{}' of {} is required", missing.name, T::LABEL)));
    }
    Ok(())
}

// payload helpers

pub fn non_empty(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        Err(ServiceError::validation(format!("Field '{field}' must not be empty")))
    } else {
        Ok(())
    }
}
pub fn max_len(field: &str, value: &str, max: usize) -> ServiceResult<()> {
    if value.chars().count() > max {
        Err(ServiceError::validation(format!("Field '{field}' must be at most {max} characters long")))
    } else {
        Ok(())
    }
}
pub fn non_negative(field: &str, value: f64) -> ServiceResult<()> {
    if value < 0.0 {
        Err(ServiceError::validation(format!("Field '{field}' must not be negative")))
    } else {
        Ok(())
    }
}
pub fn email(field: &str, value: &str) -> ServiceResult<()> {
    let valid = value.split_once('@')
        .map(|(user, domain)| !user.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'))
        .unwrap_or(false);
    if valid && !value.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ServiceError::validation(format!("Field '{field}' is not a valid email address: '{value}'")))
    }
}
pub fn positive_id(field: &str, value: i64) -> ServiceResult<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(ServiceError::validation(format!("Field '{field}' must be a positive id")))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::courses::Course;
    use crate::decimal::Decimal;
    use crate::fields::FieldValue;

    #[test]
    fn test_immutable_columns() {
        for name in [ID, CREATED_AT, UPDATED_AT] {
            let changes = ChangeSet::new().with(name, 1_i64);
            let err = validate_changes::<Course>(&changes).unwrap_err();
            assert!(err.to_string().contains("not mutable"), "{err}");
        }
    }

    #[test]
    fn test_null_only_for_nullable() {
        let changes = ChangeSet::new().with("description", FieldValue::Null);
        validate_changes::<Course>(&changes).unwrap();
        let changes = ChangeSet::new().with("title", FieldValue::Null);
        assert!(matches!(validate_changes::<Course>(&changes), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_kind_mismatch() {
        let changes = ChangeSet::new().with("price", "12");
        assert!(validate_changes::<Course>(&changes).is_err());
        let changes = ChangeSet::new().with("level", "Expert");
        assert!(validate_changes::<Course>(&changes).is_err());
        let changes = ChangeSet::new().with("price", Decimal(12.0)).with("level", "Advanced");
        validate_changes::<Course>(&changes).unwrap();
    }

    #[test]
    fn test_required_fields() {
        let fields = ChangeSet::new().with("code", "Y-1").with("title", "Yoga");
        let err = validate_new::<Course>(&fields).unwrap_err();
        assert_eq!(err.to_string(), "Field 'level' of Course is required");
    }

    #[test]
    fn test_email() {
        email("email", "ann@studio.org").unwrap();
        for bad in ["ann", "ann@", "@studio.org", "ann@studio", "ann @studio.org", "ann@studio."] {
            assert!(email("email", bad).is_err(), "{bad}");
        }
    }
}
