use std::future::Future;

use anyhow::Result;

use crate::models::ReferenceRecord;

mod memory;
mod references;

pub use memory::MemoryRepository;

/// Storage for reference signatures. `list` returns records in the order
/// they were appended.
pub trait ReferenceRepository: Send + Sync + 'static {
    fn list(&self) -> impl Future<Output = Result<Vec<ReferenceRecord>>> + Send;

    fn append(&self, record: ReferenceRecord) -> impl Future<Output = Result<()>> + Send;

    /// Returns false when no record had that id.
    fn remove(&self, id: &str) -> impl Future<Output = Result<bool>> + Send;
}
