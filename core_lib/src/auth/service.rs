use std::net::IpAddr;
use std::sync::Arc;

use crate::auth::guard::{AuthGuard, AuthPolicy, GuardStatus};
use crate::config::AuthConfig;
use crate::error::AppError;

/// Shared-secret check in front of the file routes.
#[derive(Clone)]
pub struct AuthService {
    token: Arc<str>,
    no_auth: bool,
    guard: AuthGuard,
}

impl AuthService {
    pub fn new(token: impl Into<Arc<str>>, policy: AuthPolicy) -> Self {
        Self {
            token: token.into(),
            no_auth: false,
            guard: AuthGuard::new(policy),
        }
    }

    pub fn disabled() -> Self {
        Self {
            token: Arc::from(""),
            no_auth: true,
            guard: AuthGuard::default(),
        }
    }

    pub fn from_config(config: &AuthConfig, token: impl Into<Arc<str>>) -> Self {
        if config.no_auth {
            return Self::disabled();
        }
        Self::new(
            token,
            AuthPolicy {
                max_attempts: config.max_attempts,
                ban_duration: config.ban_duration(),
            },
        )
    }

    pub fn is_enabled(&self) -> bool {
        !self.no_auth
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn guard(&self) -> &AuthGuard {
        &self.guard
    }

    /// Runs the ban check, then compares `presented` with the shared token.
    /// A banned client is rejected without touching its counters.
    pub fn authorize(&self, ip: IpAddr, presented: Option<&str>) -> Result<(), AppError> {
        if self.no_auth {
            return Ok(());
        }

        if let GuardStatus::Banned { minutes_left } = self.guard.check(ip) {
            return Err(banned(minutes_left));
        }

        if presented == Some(&*self.token) {
            self.guard.record_success(ip);
            return Ok(());
        }

        tracing::debug!(client_ip = %ip, "rejected credential");
        self.guard.record_failure(ip);
        Err(AppError::Unauthorized)
    }
}

fn banned(minutes_left: u64) -> AppError {
    AppError::Forbidden(format!(
        "Too many failed attempts. Please try again in {} minutes.",
        minutes_left
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_correct_token_is_accepted() {
        let auth = AuthService::new("s3cret", AuthPolicy::default());
        assert!(auth.authorize(IP, Some("s3cret")).is_ok());
        assert!(matches!(auth.authorize(IP, None), Err(AppError::Unauthorized)));
        assert!(matches!(auth.authorize(IP, Some("S3CRET")), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_banned_client_is_rejected_even_with_correct_token() {
        let auth = AuthService::new(
            "s3cret",
            AuthPolicy {
                max_attempts: 2,
                ban_duration: Duration::from_secs(120),
            },
        );

        for _ in 0..3 {
            let _ = auth.authorize(IP, Some("wrong"));
        }

        match auth.authorize(IP, Some("s3cret")) {
            Err(AppError::Forbidden(msg)) => assert!(msg.contains("2 minutes")),
            other => panic!("expected ban, got {:?}", other),
        }
    }

    #[test]
    fn test_disabled_auth_touches_no_state() {
        let auth = AuthService::disabled();
        assert!(!auth.is_enabled());
        assert!(auth.authorize(IP, None).is_ok());
        assert!(auth.authorize(IP, Some("anything")).is_ok());
        assert_eq!(auth.guard().tracked_clients(), 0);
    }
}
