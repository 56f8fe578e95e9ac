use anyhow::Result;
use async_trait::async_trait;

/// Read access to the stored originals.
#[async_trait]
pub trait Storage: Send + Sync {
  /// Reads the object at `key`, a cleaned path relative to the storage root.
  async fn read_file(&self, key: &str) -> Result<Vec<u8>>;
}
