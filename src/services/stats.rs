//! Rolling-window execution statistics for observability.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::DomainResult;
use crate::domain::models::StatsReport;
use crate::domain::ports::ExecutionLog;

/// Default observability window.
pub const DEFAULT_WINDOW_HOURS: u64 = 24;

#[derive(Clone)]
pub struct ExecutionStats {
    log: Arc<dyn ExecutionLog>,
}

impl ExecutionStats {
    pub fn new(log: Arc<dyn ExecutionLog>) -> Self {
        Self { log }
    }

    /// Aggregate counts plus per-action-type and per-agent-type breakdowns
    /// over the given window.
    pub async fn report(&self, window_hours: u64) -> DomainResult<StatsReport> {
        let window = Duration::from_secs(window_hours * 3600);
        let mut report = self.log.stats(window).await?;
        report.window_hours = window_hours;
        Ok(report)
    }
}

impl std::fmt::Debug for ExecutionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStats").finish()
    }
}
