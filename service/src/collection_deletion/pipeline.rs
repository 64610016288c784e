use crate::{
    collection_deletion::{
        context::DeletionContext,
        steps::{ConnectToStoreStep, DrainCollectionStep, ValidateSettingsStep},
    },
    pipeline::Pipeline,
};

impl Default for Pipeline<DeletionContext> {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline<DeletionContext> {
    pub fn new() -> Self {
        Self::with_steps(vec![
            Box::new(ValidateSettingsStep),
            Box::new(ConnectToStoreStep),
            Box::new(DrainCollectionStep),
        ])
    }
}
