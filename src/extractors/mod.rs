//! Request extractors.

mod caller;
pub use caller::{Caller, USER_ID_PARAM};
