//! Constants used throughout the bridge core crate.

/// Environment variable naming an optional YAML config file.
pub const CONFIG_PATH_ENV: &str = "HEALTHBRIDGE_CONFIG";

/// Environment variable overriding the configured locale.
pub const LOCALE_ENV: &str = "HEALTHBRIDGE_LOCALE";

/// Locale used when none is configured.
pub const DEFAULT_LOCALE: &str = "en_US";

/// Documents per batch when streaming document query results.
pub const DEFAULT_DOCUMENT_BATCH_SIZE: usize = 10;

/// Buffered wire strings per observer query before the producer waits.
pub const OBSERVER_CHANNEL_CAPACITY: usize = 32;

/// Buffered batches per document query.
pub const DOCUMENT_CHANNEL_CAPACITY: usize = 4;

/// Buffered change notifications in the in-memory store.
pub const STORE_CHANGE_CAPACITY: usize = 256;

/// Upper bound on buckets in one statistics collection.
pub const MAX_COLLECTION_BUCKETS: usize = 10_000;
