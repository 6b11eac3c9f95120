//! Shared application state for all routes.

use crate::auth::TokenAuth;
use crate::media::MediaStore;
use crate::service::MemberService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub members: MemberService,
    pub auth: Arc<TokenAuth>,
    pub media: Arc<dyn MediaStore>,
}
