//! Local masternode identity.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bczd_log::log_info;
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActiveStatus {
    Initial,
    NotCapable,
    Started,
}

impl ActiveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActiveStatus::Initial => "initial",
            ActiveStatus::NotCapable => "not capable",
            ActiveStatus::Started => "started",
        }
    }
}

impl fmt::Display for ActiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct ActiveState {
    status: ActiveStatus,
    collateral: Option<OutPoint>,
    service: Option<NetAddr>,
    reason: String,
}

/// Operator key of this node and whether the network has started it.
#[derive(Debug)]
pub struct ActiveMasternode {
    pubkey_operator: Option<Vec<u8>>,
    state: Mutex<ActiveState>,
}

impl ActiveMasternode {
    pub fn new(pubkey_operator: Option<Vec<u8>>) -> Self {
        let (status, reason) = if pubkey_operator.is_some() {
            (ActiveStatus::Initial, String::new())
        } else {
            (
                ActiveStatus::NotCapable,
                "no operator key configured".to_string(),
            )
        };
        Self {
            pubkey_operator,
            state: Mutex::new(ActiveState {
                status,
                collateral: None,
                service: None,
                reason,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ActiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pubkey_operator(&self) -> Option<&[u8]> {
        self.pubkey_operator.as_deref()
    }

    pub fn matches_operator(&self, pubkey: &[u8]) -> bool {
        self.pubkey_operator.as_deref() == Some(pubkey)
    }

    /// Remote start: the controller announced this node.
    pub fn enable_hot_cold(&self, collateral: OutPoint, service: NetAddr) -> bool {
        if self.pubkey_operator.is_none() {
            return false;
        }
        let mut state = self.state();
        let already = state.status == ActiveStatus::Started
            && state.collateral.as_ref() == Some(&collateral);
        state.status = ActiveStatus::Started;
        state.reason.clear();
        if !already {
            log_info!(
                "masternode {} remotely started at {}",
                collateral.to_short_string(),
                service
            );
        }
        state.collateral = Some(collateral);
        state.service = Some(service);
        true
    }

    pub fn status(&self) -> ActiveStatus {
        self.state().status
    }

    pub fn collateral(&self) -> Option<OutPoint> {
        self.state().collateral.clone()
    }

    pub fn service(&self) -> Option<NetAddr> {
        self.state().service
    }

    pub fn status_message(&self) -> String {
        let state = self.state();
        match state.status {
            ActiveStatus::Initial => "node just started, not yet activated".to_string(),
            ActiveStatus::NotCapable => format!("not capable masternode: {}", state.reason),
            ActiveStatus::Started => "masternode successfully started".to_string(),
        }
    }
}
