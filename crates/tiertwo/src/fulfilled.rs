//! Requests already made to (or answered for) a peer address, so sync does
//! not ask the same peer twice and get banned for it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bczd_primitives::netaddr::NetAddr;

pub const GETSPORK_REQUEST: &str = "getspork";
pub const MNSYNC_REQUEST: &str = "mnsync";

pub struct NetFulfilledRequestManager {
    expire_secs: i64,
    requests: Mutex<BTreeMap<NetAddr, BTreeMap<String, i64>>>,
}

impl NetFulfilledRequestManager {
    pub fn new(expire_secs: i64) -> Self {
        Self {
            expire_secs,
            requests: Mutex::new(BTreeMap::new()),
        }
    }

    fn requests(&self) -> MutexGuard<'_, BTreeMap<NetAddr, BTreeMap<String, i64>>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, addr: &NetAddr, request: &str, now: i64) {
        self.requests()
            .entry(*addr)
            .or_default()
            .insert(request.to_string(), now + self.expire_secs);
    }

    pub fn has(&self, addr: &NetAddr, request: &str, now: i64) -> bool {
        self.requests()
            .get(addr)
            .and_then(|requests| requests.get(request))
            .map_or(false, |expires| *expires > now)
    }

    pub fn check_and_remove(&self, now: i64) {
        self.requests().retain(|_, requests| {
            requests.retain(|_, expires| now <= *expires);
            !requests.is_empty()
        });
    }

    pub fn clear(&self) {
        self.requests().clear();
    }

    /// Number of peers with at least one tracked request.
    pub fn len(&self) -> usize {
        self.requests().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for NetFulfilledRequestManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nodes with fulfilled requests: {}", self.len())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn addr(last: u8) -> NetAddr {
        NetAddr::new(IpAddr::V4(Ipv4Addr::new(203, 0, 113, last)), 29_500)
    }

    #[test]
    fn requests_expire() {
        let fulfilled = NetFulfilledRequestManager::new(300);
        fulfilled.add(&addr(1), GETSPORK_REQUEST, 1_000);
        assert!(fulfilled.has(&addr(1), GETSPORK_REQUEST, 1_000));
        assert!(fulfilled.has(&addr(1), GETSPORK_REQUEST, 1_299));
        assert!(!fulfilled.has(&addr(1), GETSPORK_REQUEST, 1_300));
        assert!(!fulfilled.has(&addr(1), MNSYNC_REQUEST, 1_000));
        assert!(!fulfilled.has(&addr(2), GETSPORK_REQUEST, 1_000));
    }

    #[test]
    fn maintenance_drops_empty_peers() {
        let fulfilled = NetFulfilledRequestManager::new(300);
        fulfilled.add(&addr(1), GETSPORK_REQUEST, 1_000);
        fulfilled.add(&addr(2), GETSPORK_REQUEST, 1_000);
        fulfilled.add(&addr(2), MNSYNC_REQUEST, 1_200);
        assert_eq!(fulfilled.len(), 2);

        fulfilled.check_and_remove(1_301);
        assert_eq!(fulfilled.len(), 1);
        assert!(fulfilled.has(&addr(2), MNSYNC_REQUEST, 1_301));
        assert_eq!(fulfilled.to_string(), "Nodes with fulfilled requests: 1");

        fulfilled.clear();
        assert!(fulfilled.is_empty());
    }
}
