//! Cache key generation using SHA-256 hashes

use sha2::{Digest, Sha256};

/// Generate a deterministic cache key from a backend kind, a source identifier
/// and the transform parameters applied to it.
///
/// Parameters are sorted before hashing so callers need not agree on order.
/// Every parameter that affects the delivered URL must be passed in.
pub fn cache_key(kind: &str, source: &str, params: &[(&str, &str)]) -> String {
    let mut hasher = Sha256::new();

    hasher.update(kind.as_bytes());
    hasher.update(b"|");

    hasher.update(source.as_bytes());
    hasher.update(b"|");

    let mut sorted_params: Vec<_> = params.iter().collect();
    sorted_params.sort_by_key(|(k, _)| *k);

    for (k, v) in sorted_params {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
        hasher.update(b"&");
    }

    format!("{:x}", hasher.finalize())
}
