use crate::error::BlobError;

/// BlobStore provides storage for binary objects (uploaded product images).
///
/// Keys are path-like strings: `images/mug-1717.jpg`. The default
/// implementation (`FileStore`) maps keys to local filesystem paths. Can be
/// swapped for S3/OSS backends by implementing this trait.
///
/// The inventory core treats keys as opaque ownership references: it stores
/// them on product records and deletes them when the owning product dies —
/// it never reads or interprets the bytes.
pub trait BlobStore: Send + Sync {
    /// Store a blob. Overwrites if the key already exists.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Retrieve a blob. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Delete a blob. No-op if the key does not exist.
    fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Check whether a blob exists.
    fn exists(&self, key: &str) -> Result<bool, BlobError>;

    /// List keys matching a prefix, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError>;
}
