//! MemberService: validated member operations over the ranked store.

mod members;
mod rank;
mod validation;
pub use members::MemberService;
pub use rank::RankAllocator;
pub use validation::{Identity, MemberInput};
