//! Domain models for session-service.

mod session;
pub mod timespan;

pub use session::{join_tags, split_tags, Session, SessionDraft, SessionFields, TAG_DELIMITER};
pub use timespan::{format_timespan, parse_timespan, TimespanError};
