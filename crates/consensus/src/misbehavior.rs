//! Rejection outcome for peer-supplied data.
//!
//! Validation of network input returns `Result<T, Rejection>`; the `dos`
//! field is the misbehavior score the caller forwards to the peer-reputation
//! layer. A score of zero is a silent drop.

use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rejection {
    pub reason: &'static str,
    pub dos: u32,
}

impl Rejection {
    pub const fn silent(reason: &'static str) -> Self {
        Self { reason, dos: 0 }
    }

    pub const fn penalize(reason: &'static str, dos: u32) -> Self {
        Self { reason, dos }
    }

    pub fn is_penalized(&self) -> bool {
        self.dos > 0
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dos > 0 {
            write!(f, "{} (dos {})", self.reason, self.dos)
        } else {
            write!(f, "{}", self.reason)
        }
    }
}

impl std::error::Error for Rejection {}

/// Collapses a validation result into the DoS score reported to the peer layer.
pub fn dos_score<T>(result: &Result<T, Rejection>) -> u32 {
    match result {
        Ok(_) => 0,
        Err(rejection) => rejection.dos,
    }
}
