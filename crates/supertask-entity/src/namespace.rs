//! Namespace derivation.
//!
//! A namespace scopes all jobs of one timetable inside a shared job store.
//! When a document does not name one, it is derived from the host, the user
//! and the document's location, so re-registering after a restart lands in
//! the same table.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Resource name used when a timetable has no recorded source.
pub const GLOBAL_RESOURCE: &str = "global";

/// Number of hex characters kept from the digest.
const NAMESPACE_LEN: usize = 16;

/// Derive a namespace from its inputs. Pure.
pub fn derive(hostname: &str, username: &str, resource: &str) -> String {
    let digest = Sha256::digest(format!("{hostname}-{username}-{resource}").as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(NAMESPACE_LEN);
    encoded
}

/// Derive the namespace for a timetable loaded from `source` on this host.
pub fn for_source(source: Option<&str>) -> String {
    derive(&current_hostname(), &current_username(), &resource_name(source))
}

/// The absolute path when `source` exists on disk, the raw string otherwise,
/// or [`GLOBAL_RESOURCE`] when there is no source.
pub fn resource_name(source: Option<&str>) -> String {
    let Some(source) = source else {
        return GLOBAL_RESOURCE.to_string();
    };
    let path = Path::new(source);
    if path.exists() {
        if let Ok(absolute) = std::path::absolute(path) {
            return absolute.to_string_lossy().to_string();
        }
    }
    source.to_string()
}

/// Host name of this machine, or `localhost` when it cannot be read.
pub fn current_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "localhost".to_string())
}

/// Login name from the environment, or `unknown`.
pub fn current_username() -> String {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive("host", "alice", "/srv/timetable.yaml");
        let b = derive("host", "alice", "/srv/timetable.yaml");
        assert_eq!(a, b);
        assert_eq!(a.len(), NAMESPACE_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_derive_depends_on_every_input() {
        let base = derive("host", "alice", "/srv/a.yaml");
        assert_ne!(base, derive("host", "alice", "/srv/b.yaml"));
        assert_ne!(base, derive("other", "alice", "/srv/a.yaml"));
        assert_ne!(base, derive("host", "bob", "/srv/a.yaml"));
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name(None), GLOBAL_RESOURCE);
        assert_eq!(
            resource_name(Some("https://example.org/timetable.yaml")),
            "https://example.org/timetable.yaml"
        );

        // Tests run with the crate directory as cwd.
        let resolved = resource_name(Some("Cargo.toml"));
        assert!(Path::new(&resolved).is_absolute());
    }

    #[test]
    fn test_for_source_is_stable() {
        assert_eq!(for_source(Some("x.yaml")), for_source(Some("x.yaml")));
        assert_ne!(for_source(Some("x.yaml")), for_source(None));
    }
}
