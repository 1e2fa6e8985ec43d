//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Analysis result constants
pub mod result {
    /// Maximum items kept in `exports`, `dependencies` and `related`
    pub const MAX_LIST_ITEMS: usize = 10;

    /// Schema versions produced by each tier
    pub const HEURISTIC_SCHEMA: &str = "heuristic-v1";
    pub const STRUCTURAL_SCHEMA: &str = "structural-v1";
    pub const MODEL_SCHEMA: &str = "model-v1";
    pub const ERROR_SCHEMA: &str = "error-v1";

    /// Schema versions the cache accepts; anything else is stale
    pub const KNOWN_SCHEMAS: &[&str] = &[HEURISTIC_SCHEMA, STRUCTURAL_SCHEMA, MODEL_SCHEMA];
}

/// Fingerprint constants
pub mod fingerprint {
    /// Files below this size are fingerprinted by content hash (1MB)
    pub const CONTENT_HASH_LIMIT: u64 = 1024 * 1024;
}

/// Cache constants
pub mod cache {
    /// Project-relative cache directory
    pub const DEFAULT_DIR: &str = ".filelens/cache";

    /// Durable log file name inside the cache directory
    pub const LOG_FILE: &str = "analysis.jsonl";

    /// Default entry time-to-live (7 days)
    pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 3600;

    /// Maximum entries held in the in-memory index
    pub const DEFAULT_MAX_ENTRIES: usize = 2000;

    /// Debounce window for write-through (milliseconds)
    pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

    /// Rewrite the log once it holds this many lines per live entry
    pub const DEFAULT_COMPACT_FACTOR: usize = 4;

    /// Length of the hex key derived from the normalized path
    pub const KEY_HEX_LEN: usize = 32;
}

/// Tier analyzer constants
pub mod analysis {
    /// Maximum file size the structural tier will read (512KB)
    pub const MAX_STRUCTURAL_BYTES: u64 = 512 * 1024;

    /// Maximum file size sent to the model tier (256KB)
    pub const MAX_MODEL_BYTES: u64 = 256 * 1024;

    /// Prompt content budget before head/tail truncation
    pub const MAX_PROMPT_CHARS: usize = 12_000;

    /// Bytes sniffed for NUL when detecting binary content
    pub const BINARY_SNIFF_BYTES: usize = 8 * 1024;

    /// Directory children listed in a model prompt
    pub const MAX_PROMPT_CHILDREN: usize = 50;

    /// Extensions never sent to the model tier
    pub const BINARY_EXTENSIONS: &[&str] = &[
        "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "mp3", "wav", "flac",
        "ogg", "mp4", "mov", "avi", "mkv", "webm", "zip", "tar", "gz", "7z", "rar", "pdf", "exe",
        "dll", "so", "dylib", "wasm", "bin", "woff", "woff2", "ttf", "otf", "eot",
    ];
}

/// Model router constants
pub mod router {
    /// Minimum interval between backend health checks (seconds)
    pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 60;

    /// Total input characters above which the secondary backend is preferred
    pub const LARGE_INPUT_CHARS: usize = 8_000;

    /// Input count at which a request counts as batched
    pub const BATCH_THRESHOLD: usize = 3;

    /// Per-call timeout (seconds)
    pub const CALL_TIMEOUT_SECS: u64 = 120;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
}
