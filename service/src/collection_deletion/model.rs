/// Summary of a finished drain run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub total_deleted: usize,
    pub batches_committed: usize,
    /// How many times the batch size was halved after an oversize commit
    pub batch_size_reductions: usize,
    pub initial_batch_size: usize,
    pub final_batch_size: usize,
}

impl DrainReport {
    pub fn new(initial_batch_size: usize) -> Self {
        Self {
            initial_batch_size,
            final_batch_size: initial_batch_size,
            ..Default::default()
        }
    }

    pub fn record_batch(&mut self, count: usize) {
        self.total_deleted += count;
        self.batches_committed += 1;
    }

    pub fn record_reduction(&mut self, new_batch_size: usize) {
        self.batch_size_reductions += 1;
        self.final_batch_size = new_batch_size;
    }
}
