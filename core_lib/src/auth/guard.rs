//! Per-client authentication failure tracking with temporary bans.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    pub max_attempts: u32,
    pub ban_duration: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            ban_duration: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ClientFailureRecord {
    failure_count: u32,
    banned_until: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStatus {
    Allowed,
    Banned { minutes_left: u64 },
}

/// Records live for the lifetime of the process; nothing evicts clients that
/// never come back.
#[derive(Clone)]
pub struct AuthGuard {
    records: Arc<Mutex<HashMap<IpAddr, ClientFailureRecord>>>,
    policy: AuthPolicy,
}

impl AuthGuard {
    pub fn new(policy: AuthPolicy) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            policy,
        }
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    pub fn check(&self, ip: IpAddr) -> GuardStatus {
        self.check_at(ip, Instant::now())
    }

    /// Reports whether `ip` is banned at `now`, clearing an expired ban.
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> GuardStatus {
        let mut records = self.records.lock();

        let Some(record) = records.get_mut(&ip) else {
            return GuardStatus::Allowed;
        };
        let Some(banned_until) = record.banned_until else {
            return GuardStatus::Allowed;
        };

        if now >= banned_until {
            records.remove(&ip);
            info!(client_ip = %ip, "auth ban expired");
            return GuardStatus::Allowed;
        }

        let remaining = banned_until.duration_since(now);
        GuardStatus::Banned {
            minutes_left: remaining.as_secs().div_ceil(60).max(1),
        }
    }

    pub fn record_failure(&self, ip: IpAddr) -> GuardStatus {
        self.record_failure_at(ip, Instant::now())
    }

    /// Counts a failed credential; the attempt after `max_attempts` bans the client.
    pub fn record_failure_at(&self, ip: IpAddr, now: Instant) -> GuardStatus {
        let mut records = self.records.lock();
        let record = records.entry(ip).or_default();

        record.failure_count = record.failure_count.saturating_add(1);
        if record.failure_count > self.policy.max_attempts {
            record.banned_until = Some(now + self.policy.ban_duration);
            warn!(
                client_ip = %ip,
                failures = record.failure_count,
                ban_minutes = self.policy.ban_duration.as_secs() / 60,
                "banning client after repeated auth failures"
            );
            return GuardStatus::Banned {
                minutes_left: self.policy.ban_duration.as_secs().div_ceil(60).max(1),
            };
        }

        GuardStatus::Allowed
    }

    pub fn record_success(&self, ip: IpAddr) {
        self.records.lock().remove(&ip);
    }

    pub fn failure_count(&self, ip: IpAddr) -> u32 {
        self.records
            .lock()
            .get(&ip)
            .map(|record| record.failure_count)
            .unwrap_or(0)
    }

    pub fn tracked_clients(&self) -> usize {
        self.records.lock().len()
    }
}

impl Default for AuthGuard {
    fn default() -> Self {
        Self::new(AuthPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn client(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_default_policy() {
        let policy = AuthPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.ban_duration, Duration::from_secs(900));
    }

    #[test]
    fn test_five_failures_do_not_ban() {
        let guard = AuthGuard::default();
        let ip = client(1);
        let now = Instant::now();

        for _ in 0..5 {
            assert_eq!(guard.record_failure_at(ip, now), GuardStatus::Allowed);
        }
        assert_eq!(guard.check_at(ip, now), GuardStatus::Allowed);
        assert_eq!(guard.failure_count(ip), 5);
    }

    #[test]
    fn test_sixth_failure_bans_for_configured_duration() {
        let guard = AuthGuard::default();
        let ip = client(2);
        let start = Instant::now();

        for _ in 0..5 {
            guard.record_failure_at(ip, start);
        }
        assert_eq!(
            guard.record_failure_at(ip, start),
            GuardStatus::Banned { minutes_left: 15 }
        );

        assert_eq!(guard.check_at(ip, start), GuardStatus::Banned { minutes_left: 15 });
        assert_eq!(
            guard.check_at(ip, start + Duration::from_secs(14 * 60 + 30)),
            GuardStatus::Banned { minutes_left: 1 }
        );

        assert_eq!(
            guard.check_at(ip, start + Duration::from_secs(15 * 60)),
            GuardStatus::Allowed
        );
        assert_eq!(guard.failure_count(ip), 0);
        assert_eq!(guard.tracked_clients(), 0);
    }

    #[test]
    fn test_success_clears_failures() {
        let guard = AuthGuard::default();
        let ip = client(3);

        guard.record_failure(ip);
        guard.record_failure(ip);
        assert_eq!(guard.failure_count(ip), 2);

        guard.record_success(ip);
        assert_eq!(guard.failure_count(ip), 0);
    }

    #[test]
    fn test_clients_are_tracked_independently() {
        let guard = AuthGuard::new(AuthPolicy {
            max_attempts: 1,
            ban_duration: Duration::from_secs(60),
        });
        let now = Instant::now();

        guard.record_failure_at(client(4), now);
        guard.record_failure_at(client(4), now);

        assert!(matches!(guard.check_at(client(4), now), GuardStatus::Banned { .. }));
        assert_eq!(guard.check_at(client(5), now), GuardStatus::Allowed);
    }
}
