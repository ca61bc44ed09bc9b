mod fs;
mod retention;
mod store;
#[cfg(test)]
mod tests;

pub use fs::FileArtifactStore;
pub use retention::{enforce_retention, RetentionResult};
pub use store::{ArtifactStore, MemoryArtifactStore};
