//! Field rules for session input and the name-uniqueness capability.

use crate::dtos::{CreateSessionRequest, UpdateSessionRequest};
use crate::models::{parse_timespan, SessionFields, TAG_DELIMITER};
use crate::services::error::{SessionError, NAME_EXISTS};
use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use validator::{Validate, ValidationError, ValidationErrors};

pub const MAX_DURATION: Duration = Duration::from_secs(60 * 60);

/// Answers whether a session name is already used by another record.
#[async_trait]
pub trait UniquenessChecker: Send + Sync {
    async fn name_is_taken(&self, name: &str) -> Result<bool, SessionError>;
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(rule("tag_empty", "Tags cannot be empty"));
    }
    if tags.iter().any(|t| t.contains(TAG_DELIMITER)) {
        return Err(rule("tag_delimiter", "Tags cannot contain ','"));
    }
    let mut seen = HashSet::new();
    if !tags.iter().all(|t| seen.insert(t.as_str())) {
        return Err(rule(
            "tags_unique",
            "All values must be unique within the collection",
        ));
    }
    Ok(())
}

pub fn validate_duration(duration: &str) -> Result<(), ValidationError> {
    if duration.trim().is_empty() {
        return Err(rule("duration_required", "Duration is required"));
    }
    match parse_timespan(duration) {
        Ok(parsed) if parsed <= MAX_DURATION => Ok(()),
        Ok(_) => Err(rule("duration_max", "Cannot exceed 1 hour")),
        Err(_) => Err(rule(
            "duration_format",
            "Duration must be a time span in hh:mm:ss format",
        )),
    }
}

fn into_result(errors: ValidationErrors) -> Result<(), SessionError> {
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(SessionError::ValidationFailed(errors))
    }
}

/// Validates inbound session payloads before anything reaches the store.
#[derive(Clone)]
pub struct SessionValidator {
    checker: Arc<dyn UniquenessChecker>,
}

impl SessionValidator {
    pub fn new(checker: Arc<dyn UniquenessChecker>) -> Self {
        Self { checker }
    }

    /// Field rules plus name uniqueness. The store is only consulted once
    /// every field rule has passed.
    pub async fn validate_create(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<SessionFields, SessionError> {
        let mut errors = request.validate().err().unwrap_or_else(ValidationErrors::new);

        if errors.errors().is_empty() && self.checker.name_is_taken(&request.name).await? {
            errors.add("name", rule("name_unique", NAME_EXISTS));
        }

        into_result(errors)?;
        to_fields(&request.name, &request.tags, &request.duration)
    }

    /// Field rules only. A rename onto an existing name is caught by the
    /// store's uniqueness constraint.
    pub fn validate_update(
        &self,
        request: &UpdateSessionRequest,
    ) -> Result<SessionFields, SessionError> {
        into_result(request.validate().err().unwrap_or_else(ValidationErrors::new))?;
        to_fields(&request.name, &request.tags, &request.duration)
    }
}

fn to_fields(name: &str, tags: &[String], duration: &str) -> Result<SessionFields, SessionError> {
    let duration = parse_timespan(duration).map_err(|_| {
        let mut errors = ValidationErrors::new();
        errors.add("duration", rule("duration_format", "Duration is not a valid time span"));
        SessionError::ValidationFailed(errors)
    })?;
    Ok(SessionFields {
        name: name.to_string(),
        tags: tags.to_vec(),
        duration,
    })
}
