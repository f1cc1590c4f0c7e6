use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

static FRESH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stable opaque id derived from content. The same parts always hash to the
/// same id, byte-identical across platforms (SHA-256 truncated to 16 bytes).
pub fn content_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    truncated_hex(&hasher.finalize())
}

/// Fresh opaque id, unique within the process. Used for plan and execution
/// ids where identity matters but content does not.
pub fn fresh_id(prefix: &str) -> String {
    let counter = FRESH_COUNTER.fetch_add(1, Ordering::SeqCst);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(counter.to_le_bytes());
    hasher.update(nanos.to_le_bytes());

    format!("{}-{}", prefix, truncated_hex(&hasher.finalize()))
}

fn truncated_hex(digest: &[u8]) -> String {
    digest.iter().take(16).fold(String::new(), |mut out, byte| {
        let _ = write!(out, "{:02x}", byte);
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_stable() {
        let a = content_id(&["full_name:john smith", "birth_year:1880"]);
        let b = content_id(&["full_name:john smith", "birth_year:1880"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_content_id_separates_parts() {
        let joined = content_id(&["ab", "c"]);
        let split = content_id(&["a", "bc"]);
        assert_ne!(joined, split);
    }

    #[test]
    fn test_fresh_id_is_unique_and_prefixed() {
        let a = fresh_id("plan");
        let b = fresh_id("plan");
        assert_ne!(a, b);
        assert!(a.starts_with("plan-"));
    }
}
