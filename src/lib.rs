//! Bureau API: REST backend for association board members kept in a dense, ranked order.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod media;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use auth::{Caller, TokenAuth};
pub use config::ServerConfig;
pub use error::{AppError, ConfigError};
pub use media::{DiskMediaStore, MediaStore};
pub use response::{success_many, success_one, success_one_ok};
pub use routes::{api_routes, common_routes, member_routes, upload_routes, uploaded_files};
pub use service::{MemberInput, MemberService, RankAllocator};
pub use state::AppState;
pub use store::{
    ensure_database_exists, ensure_member_table, Member, MemberId, MemberStore, MemoryMemberStore,
    PgMemberStore,
};
