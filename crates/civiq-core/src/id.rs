//! ID generation for civiq records
//!
//! Hash-based short ids instead of full UUIDs so they stay readable in
//! dashboards and on the CLI. Format: <prefix>-xxxxxxxx (8 lowercase
//! base32 chars). Collisions are unlikely at municipal scale; the engine
//! retries creation on a duplicate anyway.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix for issue ids
pub const ISSUE_PREFIX: &str = "civ";
/// Prefix for comment ids
pub const COMMENT_PREFIX: &str = "cmt";
/// Prefix for user ids
pub const USER_PREFIX: &str = "usr";

/// Generate a unique record id with the given prefix.
///
/// Hashes a fresh UUID together with a nanosecond timestamp and encodes
/// the first bytes as lowercase base32.
pub fn generate_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4();
    let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(uuid.as_bytes());
    hasher.update(timestamp.to_le_bytes());

    let hash = hasher.finalize();

    let encoded = base32::encode(base32::Alphabet::Crockford, &hash[..5])
        .to_lowercase()
        .chars()
        .take(8)
        .collect::<String>();

    format!("{}-{}", prefix, encoded)
}

/// Parse a record id into its prefix and hash parts.
pub fn parse_id(id: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = id.splitn(2, '-').collect();
    if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
        Some((parts[0], parts[1]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id(ISSUE_PREFIX);
        assert!(id.starts_with("civ-"));
        assert_eq!(id.len(), 12); // civ- + 8 chars
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id(ISSUE_PREFIX);
        let b = generate_id(ISSUE_PREFIX);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("civ-a1b2c3d4"), Some(("civ", "a1b2c3d4")));
        assert_eq!(parse_id("cmt-xyz"), Some(("cmt", "xyz")));
        assert_eq!(parse_id("noprefix"), None);
    }
}
