use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-IP last-visit tracker. The check is non-blocking: callers that
/// find a host visited too recently are expected to re-enqueue the URL
/// rather than wait.
#[derive(Default)]
pub struct PolitenessScheduler {
    last_visit: DashMap<IpAddr, Instant>,
}

impl PolitenessScheduler {
    pub fn new() -> Self {
        Self {
            last_visit: DashMap::new(),
        }
    }

    /// Returns `true` if a request to `ip` is allowed right now given
    /// `effective_delay`. Does not itself record the visit — callers
    /// call `record_visit` only after a successful fetch.
    pub fn allowed(&self, ip: IpAddr, effective_delay: Duration) -> bool {
        match self.last_visit.get(&ip) {
            Some(last) => last.elapsed() >= effective_delay,
            None => true,
        }
    }

    pub fn record_visit(&self, ip: IpAddr) {
        self.last_visit.insert(ip, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn first_visit_is_always_allowed() {
        let sched = PolitenessScheduler::new();
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        assert!(sched.allowed(ip, Duration::from_secs(10)));
    }

    #[test]
    fn immediate_revisit_is_blocked() {
        let sched = PolitenessScheduler::new();
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        sched.record_visit(ip);
        assert!(!sched.allowed(ip, Duration::from_secs(10)));
    }

    #[test]
    fn revisit_after_delay_elapses_is_allowed() {
        let sched = PolitenessScheduler::new();
        let ip = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        sched.record_visit(ip);
        assert!(sched.allowed(ip, Duration::from_millis(0)));
    }
}
