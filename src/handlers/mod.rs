//! HTTP handlers for members and uploads.

pub mod members;
pub mod uploads;
