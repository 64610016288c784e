pub mod collection_deletion;
pub mod error;
pub mod pipeline;
pub mod settings;

#[cfg(test)]
mod test_support;
