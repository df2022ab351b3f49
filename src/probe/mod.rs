//! Availability probing for resource codes.

use std::time::Duration;

use async_trait::async_trait;

use crate::probe::error::ProbeError;

pub mod banner_prober;
pub mod error;

/// What a probe found for one code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Availability {
    pub seats: u32,
    pub title: String,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        self.seats > 0
    }
}

/// Checks the current availability of a resource code.
///
/// Calls can take tens of seconds and run concurrently. Deadlines are applied
/// by the caller through [`probe_with_timeout`].
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, code: &str) -> Result<Availability, ProbeError>;
}

/// Probes `code`, turning an expired deadline into [`ProbeError::Timeout`].
pub async fn probe_with_timeout(
    prober: &dyn Prober,
    code: &str,
    timeout: Duration,
) -> Result<Availability, ProbeError> {
    match tokio::time::timeout(timeout, prober.probe(code)).await {
        Ok(res) => res,
        Err(_) => Err(ProbeError::Timeout {
            code: code.to_string(),
            timeout,
        }),
    }
}
