//! Cache key derivation.
//!
//! Logical keys are URLs or archive member names, so they are hashed into a
//! fixed-length file name before touching the file system.

use ring::digest::{Context, SHA256};

/// Returns the lowercase hex SHA-256 of `key`.
///
/// # Example
/// ```
/// use campaign_core::cache::cache_key;
///
/// let name = cache_key("https://example.com/image.png");
/// assert_eq!(name.len(), 64);
/// ```
pub fn cache_key(key: &str) -> String {
    let mut context = Context::new(&SHA256);
    context.update(key.as_bytes());
    let digest = context.finish();
    hex::encode(digest.as_ref())
}
