//! Request extractors.

pub mod auth;
pub mod json;
pub use auth::AdminCaller;
pub use json::JsonBody;
