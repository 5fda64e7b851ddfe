pub mod bearer_auth;
pub mod logging;
pub mod request_id;

pub use bearer_auth::{require_admin, require_auth};
pub use logging::log_error_responses;
pub use request_id::{request_id, RequestId};
