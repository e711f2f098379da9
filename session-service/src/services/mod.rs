//! Services module for session-service.

pub mod database;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod query;
pub mod sessions;
pub mod store;
pub mod token;
pub mod validation;

pub use database::PgSessionStore;
pub use error::SessionError;
pub use gateway::SessionGateway;
pub use metrics::{get_metrics, init_metrics};
pub use query::{DateRange, Page, SessionQuery};
pub use sessions::SessionService;
pub use store::{InMemorySessionStore, SessionStore};
pub use token::{RandomTokenAllocator, TokenAllocator, VersionToken};
pub use validation::{SessionValidator, UniquenessChecker};
