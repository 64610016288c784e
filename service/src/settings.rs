use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_millis(100);
/// Batch size is never halved below this. A store rejecting a batch of this
/// size as too large ends the run.
pub const MIN_BATCH_SIZE: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct DeletionSettings {
    /// Documents fetched and deleted per cycle before any reduction
    pub batch_size: usize,
    /// Wait after every committed batch
    pub pacing_interval: Duration,
}

impl Default for DeletionSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            pacing_interval: DEFAULT_PACING_INTERVAL,
        }
    }
}

impl DeletionSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.batch_size < MIN_BATCH_SIZE {
            return Err(Error::InvalidInput(format!(
                "batch size must be at least {}, got {}",
                MIN_BATCH_SIZE, self.batch_size
            )));
        }
        Ok(())
    }
}
