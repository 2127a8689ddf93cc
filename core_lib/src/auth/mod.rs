pub mod guard;
pub mod service;

pub use guard::{AuthGuard, AuthPolicy, GuardStatus};
pub use service::AuthService;
