pub mod auth;
pub mod body;

pub use auth::RequireAdmin;
pub use body::{ApiJson, ApiPath, ApiQuery, FORM_BODY_LIMIT, JsonOrForm};
