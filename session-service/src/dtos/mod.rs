pub mod sessions;

pub use sessions::{
    AverageDurationQuery, AverageDurationResponse, CreateSessionRequest, ListSessionsQuery,
    ListSessionsResponse, MessageResponse, PaginationInfo, SessionResponse, UpdateSessionRequest,
};
