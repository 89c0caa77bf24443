//! The moderator counts consumption reports and owns the stop signal.
//!
//! It moves through `Counting -> Stopping -> Terminated` exactly once: it
//! counts reports until the expected total is reached, fires the stop
//! trigger, and returns. Holding the only [`StopTrigger`] is what keeps the
//! signal single-writer.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::{Error, Result};
use crate::pipeline::consumer::ConsumerId;
use crate::shutdown::StopTrigger;

/// Outcome of a moderator run that reached its total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeratorReport {
    /// Reports received; equal to the expected total
    pub observed: usize,
    /// Consumer whose report completed the count
    pub last_consumer: Option<String>,
}

pub struct Moderator {
    expected_total: usize,
    trigger: StopTrigger,
    reports: mpsc::Receiver<ConsumerId>,
}

impl Moderator {
    pub fn new(
        expected_total: usize,
        trigger: StopTrigger,
        reports: mpsc::Receiver<ConsumerId>,
    ) -> Self {
        Self {
            expected_total,
            trigger,
            reports,
        }
    }

    /// Count reports until `expected_total` is reached, then fire the stop
    /// signal.
    ///
    /// A zero total fires immediately. If every report sender is dropped
    /// first, the signal is still fired so producers cannot stay parked on a
    /// full queue, and [`Error::ReportChannelClosed`] says how many reports
    /// never came.
    pub async fn run(self) -> Result<ModeratorReport> {
        let Moderator {
            expected_total,
            trigger,
            mut reports,
        } = self;

        let mut remaining = expected_total;
        let mut last_consumer = None;

        while remaining > 0 {
            match reports.recv().await {
                Some(consumer) => {
                    remaining -= 1;
                    debug!(consumer = %consumer, remaining, "consumption reported");
                    last_consumer = Some(consumer);
                }
                None => {
                    warn!(remaining, "report channel closed before the expected total");
                    trigger.fire();
                    return Err(Error::ReportChannelClosed { remaining });
                }
            }
        }

        let last_consumer = last_consumer.map(|id| id.to_string());
        info!(
            total = expected_total,
            last_consumer = last_consumer.as_deref().unwrap_or("-"),
            "expected total reached, stopping"
        );
        trigger.fire();

        Ok(ModeratorReport {
            observed: expected_total,
            last_consumer,
        })
    }
}
