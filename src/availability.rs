use std::collections::HashMap;

use crate::error::GateError;
use crate::transport::RestClient;

/// Failed probes tolerated per backend before the run is aborted.
pub const MAX_FAILED_PROBES: u32 = 10;

/// Anything that can answer "is this backend reachable right now".
#[allow(async_fn_in_trait)]
pub trait Probe {
    async fn probe(&self) -> Result<(), String>;
}

impl Probe for RestClient {
    async fn probe(&self) -> Result<(), String> {
        RestClient::probe(self).await
    }
}

/// Per-run state threaded through the availability gate.
///
/// Counters only ever grow; they are never reset within a run.
#[derive(Debug, Default)]
pub struct RunContext {
    failed_probes: HashMap<String, u32>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed_probes(&self, system: &str) -> u32 {
        self.failed_probes.get(system).copied().unwrap_or(0)
    }

    fn record_failure(&mut self, system: &str) -> u32 {
        let count = self.failed_probes.entry(system.to_owned()).or_insert(0);
        *count += 1;
        *count
    }
}

/// Probe `system` once.
///
/// Returns `Ok(true)` when reachable and `Ok(false)` when the probe failed but
/// the failure budget is not yet spent; the result is advisory. Once more than
/// [`MAX_FAILED_PROBES`] failures have accumulated the run must stop.
#[tracing::instrument(skip(ctx, probe), err)]
pub async fn check(
    ctx: &mut RunContext,
    system: &str,
    probe: &impl Probe,
) -> Result<bool, GateError> {
    match probe.probe().await {
        Ok(()) => {
            tracing::debug!(system, "backend reachable");
            Ok(true)
        }
        Err(detail) => {
            let attempts = ctx.record_failure(system);
            if attempts > MAX_FAILED_PROBES {
                tracing::error!(system, attempts, error = %detail, "backend unreachable, giving up");
                return Err(GateError::Unreachable {
                    system: system.to_owned(),
                    attempts,
                    detail,
                });
            }
            tracing::warn!(system, attempts, error = %detail, "backend not available, continuing");
            Ok(false)
        }
    }
}
