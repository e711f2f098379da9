pub mod health;
pub mod sessions;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use sessions::{
    average_duration, create_session, delete_session, get_session, get_session_by_token,
    list_sessions, update_session,
};
