use crate::services::token::VersionToken;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Separator used when a tag set is flattened into a single column.
pub const TAG_DELIMITER: char = ',';

/// A persisted session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: Uuid,
    pub etag: VersionToken,
    pub created_utc: DateTime<Utc>,
    pub name: String,
    pub tags: Vec<String>,
    pub duration: Duration,
}

/// Caller-editable fields, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFields {
    pub name: String,
    pub tags: Vec<String>,
    pub duration: Duration,
}

/// A session about to be inserted. The store assigns `created_utc`.
#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub session_id: Uuid,
    pub etag: VersionToken,
    pub fields: SessionFields,
}

impl SessionDraft {
    pub fn new(fields: SessionFields, etag: VersionToken) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            etag,
            fields,
        }
    }

    pub fn into_session(self, created_utc: DateTime<Utc>) -> Session {
        Session {
            session_id: self.session_id,
            etag: self.etag,
            created_utc,
            name: self.fields.name,
            tags: self.fields.tags,
            duration: self.fields.duration,
        }
    }
}

impl Session {
    /// Overwrites the editable fields and rotates the version token.
    /// `session_id` and `created_utc` are never touched.
    pub fn revise(&mut self, fields: SessionFields, etag: VersionToken) {
        self.name = fields.name;
        self.tags = fields.tags;
        self.duration = fields.duration;
        self.etag = etag;
    }

    pub fn tags_column(&self) -> String {
        join_tags(&self.tags)
    }
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(&TAG_DELIMITER.to_string())
}

/// Inverse of [`join_tags`]. An empty column is an empty tag set.
pub fn split_tags(column: &str) -> Vec<String> {
    if column.is_empty() {
        return Vec::new();
    }
    column.split(TAG_DELIMITER).map(str::to_string).collect()
}
