pub mod error;
pub mod result;

pub use error::{BackendError, ErrorCategory, ErrorClassifier, LensError, Result};
pub use result::{AnalysisResult, Role, Tier, bound_list};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::cache::KEY_HEX_LEN;

/// Stable cache key derived from a normalized target path
///
/// Separator variants of the same path map to the same key. Casing variants
/// do too, but only where the host filesystem ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetKey(String);

impl TargetKey {
    pub fn for_path(path: &Path) -> Self {
        let normalized = normalize_target(&path.to_string_lossy());
        let digest = Sha256::digest(normalized.as_bytes());
        let mut hex = format!("{:x}", digest);
        hex.truncate(KEY_HEX_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether paths differing only in case name the same file on this host
pub const CASE_INSENSITIVE_PATHS: bool = cfg!(any(windows, target_os = "macos"));

/// Normalize a path string: forward slashes, no trailing slash, and
/// lowercase where [`CASE_INSENSITIVE_PATHS`] holds
pub fn normalize_target(raw: &str) -> String {
    let mut normalized = raw.trim().replace('\\', "/");
    if CASE_INSENSITIVE_PATHS {
        normalized = normalized.to_lowercase();
    }
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_target() {
        let expected = if CASE_INSENSITIVE_PATHS {
            "c:/repo/src"
        } else {
            "C:/Repo/Src"
        };
        assert_eq!(normalize_target("C:\\Repo\\Src\\"), expected);
        assert_eq!(normalize_target("/"), "/");
        assert_eq!(normalize_target("src/lib.rs"), "src/lib.rs");
    }

    #[test]
    fn test_key_is_fixed_length_hex() {
        let key = TargetKey::for_path(Path::new("src/main.rs"));
        assert_eq!(key.as_str().len(), KEY_HEX_LEN);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_case_folding_follows_host() {
        let upper = TargetKey::for_path(Path::new("src/Foo.rs"));
        let lower = TargetKey::for_path(Path::new("src/foo.rs"));
        assert_eq!(upper == lower, CASE_INSENSITIVE_PATHS);
    }

    proptest! {
        #[test]
        fn prop_key_ignores_separator(segments in proptest::collection::vec("[a-zA-Z0-9_]{1,8}", 1..6)) {
            let unix = segments.join("/");
            let windows = segments.join("\\");
            prop_assert_eq!(
                TargetKey::for_path(Path::new(&unix)),
                TargetKey::for_path(Path::new(&windows))
            );
        }
    }
}
