/// Storage key of the photo -> memos mapping document
pub const MEMOS_STORAGE_KEY: &str = "@photo_memos";

/// Name of the memo audio directory inside the data directory
pub const MEMO_DIRECTORY_NAME: &str = "memos";

/// Prefix of committed memo file names (memo_<timestamp_ms>.<ext>)
pub const MEMO_FILE_PREFIX: &str = "memo_";

/// Extension of committed memo files, matching what `WavBackend` captures
pub const DEFAULT_MEMO_EXTENSION: &str = "wav";

/// Lock file that keeps a second process off the same data directory
pub const STORE_LOCK_FILE: &str = "store.lock";

/// Samples per chunk pushed through audio channels
pub const CHUNK_SAMPLES: usize = 1024;

/// Capacity of the bounded PCM channels between threads
pub const CHANNEL_CAPACITY: usize = 100;
