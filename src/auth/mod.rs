pub mod login_limiter;
pub mod orchestrator;
