pub mod middleware;

pub use middleware::{require_token, AuthState};
